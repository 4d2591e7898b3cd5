// src/copy/notification.rs

//! Accept and reject messages for copies

use crate::config::NotifyConfig;
use crate::db::models::Person;
use crate::error::CopyRefusal;
use crate::services::Notification;

/// Sender used when neither a person nor the configuration supplies one
pub const DEFAULT_FROM_ADDRESS: &str = "Archive Publisher <noreply@depot.invalid>";

/// What an accepted copy produced, for the accept message
#[derive(Debug, Clone, Default)]
pub struct CopySummary {
    pub source_name: String,
    pub version: String,
    pub archive_name: String,
    pub suite: String,
    pub is_primary: bool,
    /// Aggregated change history since the last published version
    pub changes: String,
    pub new_publications: usize,
    /// Binaries not copied because they were already present
    pub skipped_binaries: Vec<String>,
}

fn sender(from: Option<&Person>, config: &NotifyConfig) -> String {
    from.and_then(Person::address)
        .or_else(|| config.from_address.clone())
        .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string())
}

fn push_unique(to: &mut Vec<String>, address: Option<String>) {
    if let Some(address) = address
        && !to.contains(&address)
    {
        to.push(address);
    }
}

/// Message announcing an accepted copy
///
/// Sent from `from` (the sponsored person when there is one) to the creator
/// and sponsor, plus the announcement list for primary archives. `None` when
/// nobody has an address.
pub fn accepted(
    summary: &CopySummary,
    from: Option<&Person>,
    recipients: &[&Person],
    config: &NotifyConfig,
) -> Option<Notification> {
    let mut to = Vec::new();
    for person in recipients {
        push_unique(&mut to, person.address());
    }
    if summary.is_primary {
        push_unique(&mut to, config.announce_list.clone());
    }
    if to.is_empty() {
        return None;
    }

    let mut body = format!(
        "Accepted:\n  {} {} copied into {}/{}\n  {} new publication(s)\n",
        summary.source_name,
        summary.version,
        summary.archive_name,
        summary.suite,
        summary.new_publications
    );
    if !summary.skipped_binaries.is_empty() {
        body.push_str("\nAlready present, not copied:\n");
        for binary in &summary.skipped_binaries {
            body.push_str(&format!("  {binary}\n"));
        }
    }
    if !summary.changes.is_empty() {
        body.push_str("\nChanges:\n");
        body.push_str(&summary.changes);
        body.push('\n');
    }

    Some(Notification {
        from: sender(from, config),
        to,
        subject: format!(
            "[{}/{}] {} {} (Accepted)",
            summary.archive_name, summary.suite, summary.source_name, summary.version
        ),
        body,
    })
}

/// One message listing every refused copy of a batch, or `None` when
/// nothing was refused or the requester has no address
pub fn rejected(
    refusals: &[CopyRefusal],
    requester: Option<&Person>,
    config: &NotifyConfig,
) -> Option<Notification> {
    if refusals.is_empty() {
        return None;
    }
    let to = requester.and_then(Person::address)?;

    let mut body = String::from("Rejected:\n");
    for refusal in refusals {
        body.push_str(&format!("  {refusal}\n"));
    }

    let subject = match refusals {
        [only] => format!("{} {} (Rejected)", only.source_name, only.version),
        _ => format!("{} copies rejected", refusals.len()),
    };

    Some(Notification {
        from: sender(None, config),
        to: vec![to],
        subject,
        body,
    })
}
