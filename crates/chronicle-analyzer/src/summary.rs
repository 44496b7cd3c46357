use std::collections::HashSet;

use chronicle_core::types::DiscussionId;
use chronicle_gateway::{GenerateRequest, GenerateResult, ModelGateway};
use chronicle_store::ArchiveStore;
use tracing::warn;

/// First N messages of a discussion's transcript sent to the summarizer
/// (§4.5: "sends its first ≤100 messages").
const SUMMARY_MESSAGE_CAP: usize = 100;

/// Regenerate the summary for every discussion touched by a run (§4.5: "at
/// the end of the run, regenerate summaries for every discussion that
/// received at least one new message"). Best-effort: a discussion whose
/// summary generation fails keeps its previous summary rather than being
/// overwritten with an empty one.
pub async fn generate_summaries(store: &ArchiveStore, gateway: &ModelGateway, touched: &HashSet<DiscussionId>) {
    for &id in touched {
        if let Err(e) = generate_one(store, gateway, id).await {
            warn!(discussion_id = id.as_i64(), error = %e, "summary generation failed, leaving previous summary");
        }
    }
}

async fn generate_one(store: &ArchiveStore, gateway: &ModelGateway, id: DiscussionId) -> crate::error::Result<()> {
    let Some(discussion) = store.get_discussion(id).map_err(crate::error::AnalyzerError::Store)? else {
        return Ok(());
    };
    let mut message_ids = store.message_ids_for_discussion(id).map_err(crate::error::AnalyzerError::Store)?;
    message_ids.truncate(SUMMARY_MESSAGE_CAP);
    let messages = store.get_messages_by_ids(&message_ids).map_err(crate::error::AnalyzerError::Store)?;
    if messages.is_empty() {
        return Ok(());
    }

    let transcript: Vec<String> = messages
        .iter()
        .map(|m| {
            let sender = m.sender_id.map(|p| p.as_i64().to_string()).unwrap_or_default();
            let reply_note = m
                .reply_to_message_id
                .map(|r| format!(" (replying to message {})", r.as_i64()))
                .unwrap_or_default();
            format!("{sender}{reply_note}: {}", m.content.as_deref().unwrap_or(""))
        })
        .collect();

    let prompt = format!(
        "Write a concise two-to-three sentence summary of this discussion titled \"{}\".\n\n{}",
        discussion.title,
        transcript.join("\n"),
    );

    let req = GenerateRequest::simple(prompt);
    let result = gateway.generate(req).await.map_err(crate::error::AnalyzerError::Gateway)?;
    let text = match result {
        GenerateResult::Text(t) => t,
        GenerateResult::Structured(v) => v.to_string(),
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    store.set_discussion_summary(id, text).map_err(crate::error::AnalyzerError::Store)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn skips_discussions_with_no_messages() {
        let store = ArchiveStore::in_memory().unwrap();
        let room = store.upsert_room("r1", None, true).unwrap();
        let id = store.create_discussion(room, None, "Empty", Utc::now(), Utc::now()).unwrap();
        // No messages linked: generate_one should return Ok without calling the gateway.
        let message_ids = store.message_ids_for_discussion(id).unwrap();
        assert!(message_ids.is_empty());
    }
}
