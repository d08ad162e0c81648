//! Authorization orchestration: admin override, admin-only commands, then policy.

use std::collections::BTreeSet;

use crate::{
    domain::{Identity, Snowflake},
    messaging::types::{Notice, Outbox},
    security::{is_admin, Policy},
};

/// How a single gate behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessCheck {
    /// Only admins may pass; the policy is not consulted.
    pub admin_only: bool,
    /// Emit the generic "Not allowed" notice on a policy denial.
    pub notify_on_deny: bool,
    /// Emit the "Admin override" notice when an admin passes.
    pub announce_override: bool,
}

impl AccessCheck {
    /// Global whitelist/blacklist gate in front of every stream command.
    pub const GLOBAL: Self = Self {
        admin_only: false,
        notify_on_deny: true,
        announce_override: true,
    };

    /// Second gate against a stream's own policy. The caller reports denials
    /// with a stream-specific message, and the override was already announced.
    pub const STREAM_LOCAL: Self = Self {
        admin_only: false,
        notify_on_deny: false,
        announce_override: false,
    };

    /// Whitelist/blacklist administration.
    pub const ADMIN_ONLY: Self = Self {
        admin_only: true,
        notify_on_deny: true,
        announce_override: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    AdminOverride,
    Allowed,
    AdminOnly,
    Denied,
}

impl Decision {
    pub fn allowed(self) -> bool {
        matches!(self, Decision::AdminOverride | Decision::Allowed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::AdminOverride => "admin_override",
            Decision::Allowed => "allowed",
            Decision::AdminOnly => "admin_only",
            Decision::Denied => "denied",
        }
    }
}

/// Decide whether `identity` may run a command guarded by `policy`.
///
/// First matching branch wins: admins always pass, then admin-only commands
/// reject everyone else, then the full identity id set is resolved against
/// `policy`. Notices for the requester are queued on `outbox`.
pub fn check_allowed(
    identity: &Identity,
    policy: &Policy,
    admin_ids: &BTreeSet<Snowflake>,
    check: AccessCheck,
    outbox: &mut Outbox,
) -> Decision {
    let decision = decide(identity, policy, admin_ids, check);

    match decision {
        Decision::AdminOverride if check.announce_override => {
            outbox.push(Notice::success(
                "Admin override",
                "Permissions overridden with admin access.",
            ));
        }
        Decision::AdminOnly => {
            outbox.push(Notice::error(
                "Admin only command",
                "Sorry, you must be a bot admin to use this command.",
            ));
        }
        Decision::Denied if check.notify_on_deny => {
            outbox.push(denied_notice());
        }
        _ => {}
    }

    tracing::debug!(
        actor = %identity.actor_id,
        location = %identity.location_id,
        group = %identity.group_id,
        roles = ?identity.role_ids,
        decision = decision.as_str(),
        "access check"
    );

    decision
}

fn decide(
    identity: &Identity,
    policy: &Policy,
    admin_ids: &BTreeSet<Snowflake>,
    check: AccessCheck,
) -> Decision {
    if is_admin(&identity.actor_id, admin_ids) {
        return Decision::AdminOverride;
    }
    if check.admin_only {
        return Decision::AdminOnly;
    }
    if policy.resolve(&identity.id_set()) {
        Decision::Allowed
    } else {
        Decision::Denied
    }
}

fn denied_notice() -> Notice {
    Notice::error("Not allowed", "Sorry, you are not allowed to take this action.").with_field(
        "This could be due to:",
        "• You have insufficient permissions here\n\
         • You are restricted from using the bot\n\
         • The bot is undergoing maintenance",
    )
}
