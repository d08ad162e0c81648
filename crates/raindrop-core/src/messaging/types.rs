/// Severity of a notice; adapters map it to colour/emoji.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// A titled message sent back to whoever issued a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
    pub fields: Vec<NoticeField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeField {
    pub name: String,
    pub value: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            fields: Vec::new(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, body)
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, body)
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(NoticeField {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// A file handed back to the requester (list exports).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// Notices and documents produced while handling one command.
///
/// Filled while the registry lock is held and delivered after it is released.
#[derive(Clone, Debug, Default)]
pub struct Outbox {
    pub notices: Vec<Notice>,
    pub documents: Vec<Document>,
}

impl Outbox {
    pub fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn attach(&mut self, file_name: impl Into<String>, contents: Vec<u8>) {
        self.documents.push(Document {
            file_name: file_name.into(),
            contents,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && self.documents.is_empty()
    }
}
