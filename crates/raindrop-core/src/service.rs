use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    access::{check_allowed, AccessCheck},
    command::{self, Command, GlobalList, ListCommand, StreamCommand},
    config::Config,
    domain::{Identity, Snowflake},
    errors::Error,
    formatting::export_ids,
    messaging::{
        port::{deliver, NotificationSink},
        types::{Notice, Outbox},
    },
    security::Policy,
    store::{load_or_default, BotData, DataStore, JsonFileStore},
    utils::{AuditEvent, AuditLogger},
    Result,
};

/// Owns the global policy store and the stream registry.
///
/// One lock guards all state and is held from the first access check to the
/// write-back of each command, so check-then-act sequences are atomic.
/// Notices are delivered after the lock is released.
pub struct BotService {
    cfg: Arc<Config>,
    state: Mutex<BotData>,
    store: Option<Arc<dyn DataStore>>,
    audit: Option<AuditLogger>,
}

impl BotService {
    pub fn new(cfg: Arc<Config>, data: BotData, store: Option<Arc<dyn DataStore>>) -> Self {
        let audit = cfg
            .audit_log_path
            .as_ref()
            .map(|p| AuditLogger::new(p.clone(), cfg.audit_log_json));
        Self {
            cfg,
            state: Mutex::new(data),
            store,
            audit,
        }
    }

    /// Load persisted state (with fallbacks) and build the service around it.
    pub fn from_config(cfg: Arc<Config>) -> Self {
        let store: Arc<dyn DataStore> = Arc::new(JsonFileStore::new(cfg.data_file.clone()));
        let defaults = cfg
            .defaults_file
            .as_ref()
            .map(|p| JsonFileStore::new(p.clone()));
        let loaded = load_or_default(
            store.as_ref(),
            defaults.as_ref().map(|d| d as &dyn DataStore),
            BotData::with_admins(cfg.default_admins.iter().cloned()),
        );
        let data = loaded.data;
        tracing::info!(
            streams = data.streams.len(),
            whitelist = data.policy.allow.len(),
            blacklist = data.policy.deny.len(),
            admins = data.admins.len(),
            "loaded bot data"
        );
        let store = (cfg.persist_on_mutation && loaded.writable).then_some(store);
        Self::new(cfg, data, store)
    }

    pub async fn snapshot(&self) -> BotData {
        self.state.lock().await.clone()
    }

    /// Parse and run a command line. Returns `Ok(false)` when the text is not a
    /// command this bot knows.
    pub async fn handle_text(
        &self,
        text: &str,
        identity: &Identity,
        sink: &dyn NotificationSink,
    ) -> Result<bool> {
        match command::parse(text) {
            Ok(Some(cmd)) => self.execute(&cmd, identity, sink).await.map(|_| true),
            Ok(None) => Ok(false),
            Err(e) => {
                let notice = Notice::error("Usage", e.detail());
                sink.notify(&notice).await?;
                Err(e)
            }
        }
    }

    /// Run one command for `identity`, replying through `sink`.
    ///
    /// Rejections are reported to the requester and also returned.
    pub async fn execute(
        &self,
        cmd: &Command,
        identity: &Identity,
        sink: &dyn NotificationSink,
    ) -> Result<()> {
        let label = cmd.label();
        let mut outbox = Outbox::default();

        let result = {
            let mut data = self.state.lock().await;
            let result = self.apply(&mut data, cmd, identity, &label, &mut outbox);
            if let Ok(true) = result {
                self.persist(&data, &mut outbox);
            }
            result
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.record(AuditEvent::command(identity, &label, outcome));
        tracing::info!(
            command = %label,
            actor = %identity.actor_id,
            group = %identity.group_id,
            outcome,
            "command handled"
        );

        let delivered = deliver(sink, outbox).await;
        result?;
        delivered
    }

    /// Returns whether persisted state changed.
    fn apply(
        &self,
        data: &mut BotData,
        cmd: &Command,
        identity: &Identity,
        label: &str,
        outbox: &mut Outbox,
    ) -> Result<bool> {
        match cmd {
            Command::Help => {
                outbox.push(Notice::info("Commands", command::USAGE));
                Ok(false)
            }
            Command::About => {
                outbox.push(about_notice(data, &identity.location_id));
                Ok(false)
            }
            Command::Stream(sc) => self.apply_stream(data, sc, identity, label, outbox),
            Command::List(list, op) => self.apply_list(data, *list, op, identity, label, outbox),
        }
    }

    fn apply_stream(
        &self,
        data: &mut BotData,
        cmd: &StreamCommand,
        identity: &Identity,
        label: &str,
        outbox: &mut Outbox,
    ) -> Result<bool> {
        let global = &data.policy;
        let check = AccessCheck::GLOBAL;
        if !self.gate(identity, label, "global", global, &data.admins, check, outbox) {
            return Err(Error::Forbidden(format!("'{label}' denied by global policy")));
        }

        match cmd {
            StreamCommand::Create { name } => {
                data.streams
                    .create(name, identity.group_id.clone())
                    .map_err(|e| reject(outbox, "Already exists", e))?;
                outbox.push(Notice::success(
                    "Stream created",
                    format!("'{name}' has been created."),
                ));
            }
            StreamCommand::Delete { name } => {
                self.require_stream_access(data, name, identity, label, outbox)?;
                data.streams.delete(name)?;
                outbox.push(Notice::success(
                    "Stream deleted",
                    format!("'{name}' has been deleted."),
                ));
            }
            StreamCommand::Subscribe { name, channel } => {
                let channel = channel.clone().unwrap_or_else(|| identity.location_id.clone());
                self.require_subscription_access(data, name, identity, label, outbox)?;
                data.streams
                    .subscribe(name, channel.clone())
                    .map_err(|e| reject(outbox, "Already subscribed", e))?;
                outbox.push(Notice::success(
                    "Subscribed to stream",
                    format!("'{channel}' has been subscribed to '{name}'."),
                ));
            }
            StreamCommand::Unsubscribe { name, channel } => {
                let channel = channel.clone().unwrap_or_else(|| identity.location_id.clone());
                self.require_subscription_access(data, name, identity, label, outbox)?;
                data.streams
                    .unsubscribe(name, &channel)
                    .map_err(|e| reject(outbox, "Not found", e))?;
                outbox.push(Notice::success(
                    "Unsubscribed from stream",
                    format!("'{channel}' has been unsubscribed from '{name}'."),
                ));
            }
            StreamCommand::Authorize { name, id } => {
                self.require_stream_access(data, name, identity, label, outbox)?;
                data.streams
                    .authorize(name, id.clone())
                    .map_err(|e| reject(outbox, "Already authorized", e))?;
                outbox.push(Notice::success(
                    "Authorized",
                    format!("'{id}' is now authorized to modify '{name}'."),
                ));
            }
            StreamCommand::Unauthorize { name, id } => {
                self.require_stream_access(data, name, identity, label, outbox)?;
                data.streams
                    .unauthorize(name, id)
                    .map_err(|e| reject(outbox, "Not authorized", e))?;
                outbox.push(Notice::success(
                    "Unauthorized",
                    format!("'{id}' is now not authorized to modify '{name}'."),
                ));
            }
        }
        Ok(true)
    }

    fn apply_list(
        &self,
        data: &mut BotData,
        list: GlobalList,
        op: &ListCommand,
        identity: &Identity,
        label: &str,
        outbox: &mut Outbox,
    ) -> Result<bool> {
        let check = AccessCheck::ADMIN_ONLY;
        if !self.gate(identity, label, "admin", &data.policy, &data.admins, check, outbox) {
            return Err(Error::Forbidden(format!("'{label}' is admin only")));
        }

        let name = list.name();
        let ids = match list {
            GlobalList::Whitelist => &mut data.policy.allow,
            GlobalList::Blacklist => &mut data.policy.deny,
        };

        match op {
            ListCommand::Add(id) => {
                if ids.contains(id) {
                    return Err(reject(
                        outbox,
                        &format!("Already {name}ed"),
                        Error::AlreadyExists(format!("'{id}' is already {name}ed.")),
                    ));
                }
                ids.insert(id.clone());
                outbox.push(Notice::success(
                    format!("Successfully {name}ed"),
                    format!("'{id}' has been {name}ed successfully."),
                ));
                Ok(true)
            }
            ListCommand::Remove(id) => {
                if !ids.remove(id) {
                    return Err(reject(
                        outbox,
                        "Not found",
                        Error::NotFound(format!("'{id}' is not in the {name}.")),
                    ));
                }
                outbox.push(Notice::success(
                    "Successfully removed",
                    format!("'{id}' has been removed from the {name}."),
                ));
                Ok(true)
            }
            ListCommand::View => {
                outbox.attach(format!("{name}.txt"), export_ids(ids.iter()).into_bytes());
                Ok(false)
            }
        }
    }

    /// Existence check, then the stream's own policy (silent gate, specific notice).
    fn require_stream_access(
        &self,
        data: &BotData,
        name: &str,
        identity: &Identity,
        label: &str,
        outbox: &mut Outbox,
    ) -> Result<()> {
        let Some(stream) = data.streams.get(name) else {
            return Err(reject(
                outbox,
                "Not found",
                Error::NotFound(format!("'{name}' does not exist.")),
            ));
        };

        let check = AccessCheck::STREAM_LOCAL;
        if !self.gate(identity, label, "stream", &stream.policy, &data.admins, check, outbox) {
            outbox.push(Notice::error(
                "Not allowed",
                format!(
                    "'{name}' cannot be modified here. A stream can only be modified in the group \
                     it was created in, or by authorized users or in authorized groups."
                ),
            ));
            return Err(Error::ForbiddenLocal {
                stream: name.to_string(),
            });
        }
        Ok(())
    }

    fn require_subscription_access(
        &self,
        data: &BotData,
        name: &str,
        identity: &Identity,
        label: &str,
        outbox: &mut Outbox,
    ) -> Result<()> {
        if !self.cfg.open_subscriptions {
            return self.require_stream_access(data, name, identity, label, outbox);
        }
        if !data.streams.contains(name) {
            return Err(reject(
                outbox,
                "Not found",
                Error::NotFound(format!("'{name}' does not exist.")),
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn gate(
        &self,
        identity: &Identity,
        label: &str,
        gate: &str,
        policy: &Policy,
        admins: &BTreeSet<Snowflake>,
        check: AccessCheck,
        outbox: &mut Outbox,
    ) -> bool {
        let decision = check_allowed(identity, policy, admins, check, outbox);
        self.record(AuditEvent::access(identity, label, gate, decision.as_str()));
        decision.allowed()
    }

    fn persist(&self, data: &BotData, outbox: &mut Outbox) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(data) {
            tracing::error!(error = %e, "failed to persist bot data");
            outbox.push(Notice::error(
                "Not saved",
                "The change was applied but could not be saved. It will be lost on restart.",
            ));
        }
    }

    fn record(&self, event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.write(&event) {
            tracing::warn!(error = %e, path = %audit.path().display(), "audit write failed");
        }
    }
}

fn reject(outbox: &mut Outbox, title: &str, e: Error) -> Error {
    outbox.push(Notice::error(title, e.detail()));
    e
}

fn about_notice(data: &BotData, location: &Snowflake) -> Notice {
    let subs = data.streams.subscriptions_of(location);
    let subs = if subs.is_empty() {
        "None".to_string()
    } else {
        subs.join(", ")
    };
    Notice::info(
        "About Raindrop",
        "Raindrop manages notification streams that chats can subscribe to.",
    )
    .with_field("Subscriptions", subs)
    .with_field("Streams", data.streams.len().to_string())
    .with_field("Version", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::types::{Document, NoticeKind};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeSink {
        notices: StdMutex<Vec<Notice>>,
        documents: StdMutex<Vec<Document>>,
    }

    impl FakeSink {
        fn titles(&self) -> Vec<String> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.title.clone())
                .collect()
        }

        fn last(&self) -> Notice {
            self.notices.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl NotificationSink for FakeSink {
        async fn notify(&self, notice: &Notice) -> Result<()> {
            self.notices.lock().unwrap().push(notice.clone());
            Ok(())
        }

        async fn send_document(&self, document: &Document) -> Result<()> {
            self.documents.lock().unwrap().push(document.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        saved: StdMutex<Vec<BotData>>,
        fail: bool,
    }

    impl DataStore for MemoryStore {
        fn load(&self) -> Result<BotData> {
            self.saved
                .lock()
                .unwrap()
                .last()
                .cloned()
                .ok_or_else(|| Error::External("empty".to_string()))
        }

        fn save(&self, data: &BotData) -> Result<()> {
            if self.fail {
                return Err(Error::External("disk full".to_string()));
            }
            self.saved.lock().unwrap().push(data.clone());
            Ok(())
        }
    }

    fn ident(actor: &str, group: &str) -> Identity {
        Identity {
            actor_id: actor.into(),
            location_id: format!("{group}/chan").into(),
            role_ids: vec![],
            group_id: group.into(),
        }
    }

    fn service_with(data: BotData, cfg: Config) -> BotService {
        BotService::new(Arc::new(cfg), data, None)
    }

    /// Global whitelist admits groups "100" and "200"; "A1" is an admin.
    fn open_data() -> BotData {
        let mut data = BotData::with_admins([Snowflake::from("A1")]);
        data.policy.allow.insert("100".into());
        data.policy.allow.insert("200".into());
        data
    }

    fn stream(cmd: StreamCommand) -> Command {
        Command::Stream(cmd)
    }

    fn create(name: &str) -> Command {
        stream(StreamCommand::Create {
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn create_delete_create_frees_name() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let g1 = ident("u1", "100");

        svc.execute(&create("s"), &g1, &sink).await.unwrap();
        let err = svc.execute(&create("s"), &g1, &sink).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(sink.last().title, "Already exists");

        svc.execute(
            &stream(StreamCommand::Delete {
                name: "s".to_string(),
            }),
            &g1,
            &sink,
        )
        .await
        .unwrap();
        svc.execute(&create("s"), &g1, &sink).await.unwrap();

        let data = svc.snapshot().await;
        let s = data.streams.get("s").unwrap();
        assert_eq!(s.origin_group_id().as_str(), "100");
        assert!(s.policy.allow.contains("100"));
    }

    #[tokio::test]
    async fn empty_global_policy_rejects_everything() {
        let mut data = BotData::default();
        data.streams.create("alerts", "100".into()).unwrap();
        let svc = service_with(data, Config::default());
        let sink = FakeSink::default();

        let err = svc
            .execute(
                &stream(StreamCommand::Subscribe {
                    name: "alerts".to_string(),
                    channel: Some("200".into()),
                }),
                &ident("u9", "999"),
                &sink,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(sink.titles(), vec!["Not allowed"]);

        // Even the origin group is stopped at the global gate.
        let err = svc
            .execute(
                &stream(StreamCommand::Delete {
                    name: "alerts".to_string(),
                }),
                &ident("u1", "100"),
                &sink,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(svc.snapshot().await.streams.contains("alerts"));
    }

    #[tokio::test]
    async fn stream_local_gate_blocks_foreign_group_until_authorized() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let g1 = ident("u1", "100");
        let g2 = ident("u2", "200");

        svc.execute(&create("alerts"), &g1, &sink).await.unwrap();

        let authorize = |id: &str| {
            stream(StreamCommand::Authorize {
                name: "alerts".to_string(),
                id: id.into(),
            })
        };
        let delete = stream(StreamCommand::Delete {
            name: "alerts".to_string(),
        });

        let err = svc.execute(&authorize("x"), &g2, &sink).await.unwrap_err();
        assert!(matches!(err, Error::ForbiddenLocal { .. }));
        let n = sink.last();
        assert_eq!(n.title, "Not allowed");
        assert!(n.body.contains("cannot be modified here"));

        let err = svc.execute(&delete, &g2, &sink).await.unwrap_err();
        assert!(matches!(err, Error::ForbiddenLocal { .. }));

        // Origin group authorizes the other group; now it may delete.
        svc.execute(&authorize("200"), &g1, &sink).await.unwrap();
        svc.execute(&delete, &g2, &sink).await.unwrap();
        assert!(!svc.snapshot().await.streams.contains("alerts"));
    }

    #[tokio::test]
    async fn authorizing_the_actor_is_enough() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        svc.execute(&create("alerts"), &ident("u1", "100"), &sink)
            .await
            .unwrap();
        svc.execute(
            &stream(StreamCommand::Authorize {
                name: "alerts".to_string(),
                id: "u2".into(),
            }),
            &ident("u1", "100"),
            &sink,
        )
        .await
        .unwrap();

        svc.execute(
            &stream(StreamCommand::Delete {
                name: "alerts".to_string(),
            }),
            &ident("u2", "200"),
            &sink,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_rejected() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let g1 = ident("u1", "100");
        svc.execute(&create("alerts"), &g1, &sink).await.unwrap();

        let sub = stream(StreamCommand::Subscribe {
            name: "alerts".to_string(),
            channel: None,
        });
        svc.execute(&sub, &g1, &sink).await.unwrap();
        let err = svc.execute(&sub, &g1, &sink).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(sink.last().title, "Already subscribed");

        let data = svc.snapshot().await;
        let subs = &data.streams.get("alerts").unwrap().subscriber_channels;
        assert_eq!(subs.len(), 1);
        assert!(subs.contains("100/chan"));

        let unsub = stream(StreamCommand::Unsubscribe {
            name: "alerts".to_string(),
            channel: None,
        });
        svc.execute(&unsub, &g1, &sink).await.unwrap();
        let err = svc.execute(&unsub, &g1, &sink).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn subscription_gating_follows_config() {
        let sub = stream(StreamCommand::Subscribe {
            name: "alerts".to_string(),
            channel: None,
        });

        // Open (default): a globally allowed foreign group may subscribe.
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        svc.execute(&create("alerts"), &ident("u1", "100"), &sink)
            .await
            .unwrap();
        svc.execute(&sub, &ident("u2", "200"), &sink).await.unwrap();

        // Closed: the stream's own policy applies too.
        let cfg = Config {
            open_subscriptions: false,
            ..Config::default()
        };
        let svc = service_with(open_data(), cfg);
        svc.execute(&create("alerts"), &ident("u1", "100"), &sink)
            .await
            .unwrap();
        let err = svc
            .execute(&sub, &ident("u2", "200"), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ForbiddenLocal { .. }));
        svc.execute(&sub, &ident("u1", "100"), &sink).await.unwrap();
    }

    #[tokio::test]
    async fn missing_stream_is_not_found() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        for cmd in [
            StreamCommand::Delete {
                name: "nope".to_string(),
            },
            StreamCommand::Subscribe {
                name: "nope".to_string(),
                channel: None,
            },
            StreamCommand::Unauthorize {
                name: "nope".to_string(),
                id: "x".into(),
            },
        ] {
            let err = svc
                .execute(&stream(cmd), &ident("u1", "100"), &sink)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotFound(_)));
            assert_eq!(sink.last().title, "Not found");
        }
    }

    #[tokio::test]
    async fn unauthorize_origin_is_permitted() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let g1 = ident("u1", "100");
        svc.execute(&create("alerts"), &g1, &sink).await.unwrap();
        svc.execute(
            &stream(StreamCommand::Unauthorize {
                name: "alerts".to_string(),
                id: "100".into(),
            }),
            &g1,
            &sink,
        )
        .await
        .unwrap();

        let data = svc.snapshot().await;
        assert!(data.streams.get("alerts").unwrap().policy.allow.is_empty());

        // The origin group has now locked itself out; only admins get through.
        let err = svc
            .execute(
                &stream(StreamCommand::Delete {
                    name: "alerts".to_string(),
                }),
                &g1,
                &sink,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ForbiddenLocal { .. }));
        svc.execute(
            &stream(StreamCommand::Delete {
                name: "alerts".to_string(),
            }),
            &ident("A1", "999"),
            &sink,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn admin_whitelist_add_then_duplicate() {
        let svc = service_with(BotData::with_admins([Snowflake::from("A1")]), Config::default());
        let sink = FakeSink::default();
        let admin = ident("A1", "1");
        let add = Command::List(GlobalList::Whitelist, ListCommand::Add("X1".into()));

        svc.execute(&add, &admin, &sink).await.unwrap();
        assert_eq!(sink.titles(), vec!["Admin override", "Successfully whitelisted"]);

        let err = svc.execute(&add, &admin, &sink).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(sink.last().title, "Already whitelisted");
        assert!(svc.snapshot().await.policy.allow.contains("X1"));
    }

    #[tokio::test]
    async fn list_commands_are_admin_only() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        // Whitelisted group, but not an admin.
        let err = svc
            .execute(
                &Command::List(GlobalList::Blacklist, ListCommand::Add("u9".into())),
                &ident("u1", "100"),
                &sink,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(sink.titles(), vec!["Admin only command"]);
        assert!(svc.snapshot().await.policy.deny.is_empty());
    }

    #[tokio::test]
    async fn blacklist_overrides_whitelisted_group() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let admin = ident("A1", "1");
        svc.execute(
            &Command::List(GlobalList::Blacklist, ListCommand::Add("u1".into())),
            &admin,
            &sink,
        )
        .await
        .unwrap();

        let err = svc
            .execute(&create("s"), &ident("u1", "100"), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        svc.execute(
            &Command::List(GlobalList::Blacklist, ListCommand::Remove("u1".into())),
            &admin,
            &sink,
        )
        .await
        .unwrap();
        svc.execute(&create("s"), &ident("u1", "100"), &sink)
            .await
            .unwrap();

        let err = svc
            .execute(
                &Command::List(GlobalList::Blacklist, ListCommand::Remove("u1".into())),
                &admin,
                &sink,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn view_exports_newline_delimited_document() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        svc.execute(
            &Command::List(GlobalList::Whitelist, ListCommand::View),
            &ident("A1", "1"),
            &sink,
        )
        .await
        .unwrap();

        let docs = sink.documents.lock().unwrap().clone();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "whitelist.txt");
        assert_eq!(String::from_utf8(docs[0].contents.clone()).unwrap(), "100\n200\n");
    }

    #[tokio::test]
    async fn admin_override_is_announced_once_per_command() {
        let svc = service_with(BotData::with_admins([Snowflake::from("A1")]), Config::default());
        let sink = FakeSink::default();
        let admin = ident("A1", "1");
        svc.execute(&create("s"), &admin, &sink).await.unwrap();
        svc.execute(
            &stream(StreamCommand::Authorize {
                name: "s".to_string(),
                id: "u5".into(),
            }),
            &admin,
            &sink,
        )
        .await
        .unwrap();

        let overrides = sink
            .titles()
            .into_iter()
            .filter(|t| t == "Admin override")
            .count();
        assert_eq!(overrides, 2);
    }

    #[tokio::test]
    async fn mutations_write_through_and_reads_do_not() {
        let store = Arc::new(MemoryStore::default());
        let svc = BotService::new(
            Arc::new(Config::default()),
            open_data(),
            Some(store.clone() as Arc<dyn DataStore>),
        );
        let sink = FakeSink::default();

        svc.execute(&create("s"), &ident("u1", "100"), &sink)
            .await
            .unwrap();
        svc.execute(&Command::About, &ident("u1", "100"), &sink)
            .await
            .unwrap();
        let _ = svc.execute(&create("s"), &ident("u1", "100"), &sink).await;

        let saved = store.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].streams.contains("s"));
    }

    #[tokio::test]
    async fn persistence_failure_keeps_change_and_warns() {
        let store = Arc::new(MemoryStore {
            fail: true,
            ..MemoryStore::default()
        });
        let svc = BotService::new(
            Arc::new(Config::default()),
            open_data(),
            Some(store as Arc<dyn DataStore>),
        );
        let sink = FakeSink::default();
        svc.execute(&create("s"), &ident("u1", "100"), &sink)
            .await
            .unwrap();
        assert!(svc.snapshot().await.streams.contains("s"));
        assert_eq!(sink.titles(), vec!["Stream created", "Not saved"]);
    }

    #[tokio::test]
    async fn about_lists_location_subscriptions() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let g1 = ident("u1", "100");
        svc.execute(&create("alerts"), &g1, &sink).await.unwrap();
        svc.execute(
            &stream(StreamCommand::Subscribe {
                name: "alerts".to_string(),
                channel: None,
            }),
            &g1,
            &sink,
        )
        .await
        .unwrap();

        // About is ungated: an unknown identity still gets an answer.
        svc.execute(&Command::About, &ident("u1", "100"), &sink)
            .await
            .unwrap();
        let n = sink.last();
        assert_eq!(n.kind, NoticeKind::Info);
        assert_eq!(n.fields[0].name, "Subscriptions");
        assert_eq!(n.fields[0].value, "alerts");

        svc.execute(&Command::About, &ident("x", "nowhere"), &sink)
            .await
            .unwrap();
        assert_eq!(sink.last().fields[0].value, "None");
    }

    #[tokio::test]
    async fn handle_text_parses_and_reports_usage() {
        let svc = service_with(open_data(), Config::default());
        let sink = FakeSink::default();
        let g1 = ident("u1", "100");

        assert!(svc
            .handle_text("/stream create alerts", &g1, &sink)
            .await
            .unwrap());
        assert!(!svc.handle_text("/weather", &g1, &sink).await.unwrap());

        assert!(svc.handle_text("/help", &g1, &sink).await.unwrap());
        assert_eq!(sink.last().title, "Commands");
        assert_eq!(sink.last().body, command::USAGE);

        let err = svc
            .handle_text("/stream authorize alerts", &g1, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert_eq!(sink.last().title, "Usage");
    }

    #[tokio::test]
    async fn concurrent_creates_admit_exactly_one() {
        let svc = Arc::new(service_with(open_data(), Config::default()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let sink = FakeSink::default();
                svc.execute(&create("race"), &ident(&format!("u{i}"), "100"), &sink)
                    .await
                    .is_ok()
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }
}
