use std::collections::HashMap;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::db::messages as message_db;
use crate::db::products as product_db;
use crate::db::profiles as profile_db;
use crate::error::ApiError;
use crate::models::messages::{
    self, ConversationSummary, MessageResponse, ParticipantInfo, ProductInfo,
};

/// Display name substituted when the other party's profile cannot be resolved.
const UNKNOWN_PARTICIPANT: &str = "Unknown User";

/// A conversation the user started that has no persisted messages yet.
///
/// Held in session state until the first message is appended; the aggregation
/// must render it rather than drop it.
#[derive(Debug, Clone)]
pub struct DraftConversation {
    pub conversation_id: Uuid,
    pub participant_id: Uuid,
    pub product_id: Option<Uuid>,
}

/// One conversation grouped out of the raw message log, before identity and
/// product resolution.
#[derive(Debug, Clone)]
pub struct ConversationGroup {
    pub conversation_id: Uuid,
    pub participant_id: Uuid,
    pub product_id: Option<Uuid>,
    pub last_message: messages::Model,
    pub unread_count: u64,
}

/// Group a user's message log into conversations.
///
/// Pure over its input. For each conversation_id: the last message is the one
/// with the greatest created_at (ties keep the first-seen row, so one pass
/// over the same input always yields the same result); the participant is the
/// other party; the product is the first non-null product_id seen; the unread
/// count is the number of rows addressed to the user and not yet read. The
/// result is ordered by last-message timestamp descending with a stable sort.
pub fn group_for_user(all_messages: Vec<messages::Model>, user_id: Uuid) -> Vec<ConversationGroup> {
    let mut groups: HashMap<Uuid, ConversationGroup> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for message in all_messages {
        let other_party = if message.sender_id == user_id {
            message.receiver_id
        } else {
            message.sender_id
        };
        let unread = (message.receiver_id == user_id && !message.is_read) as u64;

        match groups.get_mut(&message.conversation_id) {
            None => {
                order.push(message.conversation_id);
                groups.insert(
                    message.conversation_id,
                    ConversationGroup {
                        conversation_id: message.conversation_id,
                        participant_id: other_party,
                        product_id: message.product_id,
                        last_message: message,
                        unread_count: unread,
                    },
                );
            }
            Some(group) => {
                group.unread_count += unread;
                if group.product_id.is_none() {
                    group.product_id = message.product_id;
                }
                if message.created_at > group.last_message.created_at {
                    group.last_message = message;
                }
            }
        }
    }

    // Stable sort keeps first-seen input order for equal timestamps.
    let mut result: Vec<ConversationGroup> = order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .collect();
    result.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
    result
}

/// Merge draft conversations ahead of the persisted ones.
///
/// A draft whose id already shows up in the persisted list (its first message
/// landed) is dropped in favor of the persisted entry.
pub fn merge_drafts(
    drafts: Vec<ConversationSummary>,
    persisted: Vec<ConversationSummary>,
) -> Vec<ConversationSummary> {
    let mut merged: Vec<ConversationSummary> = drafts
        .into_iter()
        .filter(|d| !persisted.iter().any(|p| p.id == d.id))
        .collect();
    merged.extend(persisted);
    merged
}

/// Derive the full conversation list for a user from the message log.
///
/// Identity lookups are cached per run so each participant is resolved at
/// most once; a missing profile becomes a placeholder instead of failing the
/// whole pass, and a missing product renders the conversation without its
/// product card.
pub async fn load_conversations(
    db: &DatabaseConnection,
    user_id: Uuid,
    drafts: &[DraftConversation],
) -> Result<Vec<ConversationSummary>, ApiError> {
    let all_messages = message_db::get_messages_for_user(db, user_id).await?;
    let groups = group_for_user(all_messages, user_id);

    let mut profile_cache: HashMap<Uuid, ParticipantInfo> = HashMap::new();
    let mut product_cache: HashMap<Uuid, Option<ProductInfo>> = HashMap::new();

    let mut persisted = Vec::with_capacity(groups.len());
    for group in groups {
        let participant =
            resolve_participant(db, group.participant_id, &mut profile_cache).await;
        let product = match group.product_id {
            Some(pid) => resolve_product(db, pid, &mut product_cache).await,
            None => None,
        };

        persisted.push(ConversationSummary {
            id: group.conversation_id,
            participant,
            product,
            last_message: Some(MessageResponse::from(group.last_message)),
            unread_count: group.unread_count,
        });
    }

    let mut draft_summaries = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let participant =
            resolve_participant(db, draft.participant_id, &mut profile_cache).await;
        let product = match draft.product_id {
            Some(pid) => resolve_product(db, pid, &mut product_cache).await,
            None => None,
        };

        draft_summaries.push(ConversationSummary {
            id: draft.conversation_id,
            participant,
            product,
            last_message: None,
            unread_count: 0,
        });
    }

    Ok(merge_drafts(draft_summaries, persisted))
}

async fn resolve_participant(
    db: &DatabaseConnection,
    participant_id: Uuid,
    cache: &mut HashMap<Uuid, ParticipantInfo>,
) -> ParticipantInfo {
    if let Some(cached) = cache.get(&participant_id) {
        return cached.clone();
    }

    let info = match profile_db::get_profile_by_id(db, participant_id).await {
        Ok(Some(profile)) => ParticipantInfo {
            id: profile.id,
            full_name: profile.full_name,
        },
        Ok(None) => ParticipantInfo {
            id: participant_id,
            full_name: Some(UNKNOWN_PARTICIPANT.to_string()),
        },
        Err(e) => {
            tracing::warn!("Failed to resolve participant {participant_id}: {e}");
            ParticipantInfo {
                id: participant_id,
                full_name: Some(UNKNOWN_PARTICIPANT.to_string()),
            }
        }
    };

    cache.insert(participant_id, info.clone());
    info
}

async fn resolve_product(
    db: &DatabaseConnection,
    product_id: Uuid,
    cache: &mut HashMap<Uuid, Option<ProductInfo>>,
) -> Option<ProductInfo> {
    if let Some(cached) = cache.get(&product_id) {
        return cached.clone();
    }

    let info = match product_db::get_product_by_id(db, product_id).await {
        Ok(Some(product)) => Some(ProductInfo {
            id: product.id,
            name: product.name,
            price: product.price,
            unit: product.unit,
            image_url: product.image_url,
        }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Failed to resolve product {product_id}: {e}");
            None
        }
    };

    cache.insert(product_id, info.clone());
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn base_time() -> chrono::DateTime<chrono::Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn message(
        conversation: Uuid,
        sender: Uuid,
        receiver: Uuid,
        offset_secs: i64,
        is_read: bool,
    ) -> messages::Model {
        messages::Model {
            id: Uuid::new_v4(),
            conversation_id: conversation,
            sender_id: sender,
            receiver_id: receiver,
            product_id: None,
            body: "hi".to_string(),
            is_read,
            is_offer: false,
            offer_status: None,
            created_at: base_time() + Duration::seconds(offset_secs),
        }
    }

    fn summary(id: Uuid) -> ConversationSummary {
        ConversationSummary {
            id,
            participant: ParticipantInfo {
                id: Uuid::new_v4(),
                full_name: None,
            },
            product: None,
            last_message: None,
            unread_count: 0,
        }
    }

    #[test]
    fn unread_count_matches_filter_definition() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let log = vec![
            message(conv, them, me, 30, false),
            message(conv, them, me, 20, true),
            message(conv, me, them, 10, false), // sent by me, never counts
            message(conv, them, me, 0, false),
        ];

        let groups = group_for_user(log, me);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].unread_count, 2);
        assert_eq!(groups[0].participant_id, them);
    }

    #[test]
    fn last_message_is_most_recent_regardless_of_input_order() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let oldest = message(conv, them, me, 0, true);
        let newest = message(conv, me, them, 50, false);
        let middle = message(conv, them, me, 25, true);
        let newest_id = newest.id;

        let groups = group_for_user(vec![middle, oldest, newest], me);
        assert_eq!(groups[0].last_message.id, newest_id);
    }

    #[test]
    fn conversations_sort_by_last_message_descending() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let conv_a = Uuid::new_v4();
        let conv_b = Uuid::new_v4();

        let log = vec![
            message(conv_b, them, me, 100, false),
            message(conv_a, them, me, 10, false),
            message(conv_b, me, them, 5, false),
            message(conv_a, me, them, 0, false),
        ];

        let groups = group_for_user(log, me);
        let ids: Vec<Uuid> = groups.iter().map(|g| g.conversation_id).collect();
        assert_eq!(ids, vec![conv_b, conv_a]);
    }

    #[test]
    fn equal_timestamps_keep_first_seen_order() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let conv_a = Uuid::new_v4();
        let conv_b = Uuid::new_v4();

        // Same created_at in both conversations; conv_a seen first.
        let log = vec![
            message(conv_a, them, me, 42, false),
            message(conv_b, them, me, 42, false),
        ];

        let first = group_for_user(log.clone(), me);
        let second = group_for_user(log, me);
        let first_ids: Vec<Uuid> = first.iter().map(|g| g.conversation_id).collect();
        let second_ids: Vec<Uuid> = second.iter().map(|g| g.conversation_id).collect();
        assert_eq!(first_ids, vec![conv_a, conv_b]);
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn product_is_first_non_null_in_group() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        let conv = Uuid::new_v4();
        let product = Uuid::new_v4();

        let mut with_product = message(conv, them, me, 0, true);
        with_product.product_id = Some(product);
        let without_product = message(conv, me, them, 50, false);

        // Most recent message carries no product; the group still resolves one.
        let groups = group_for_user(vec![without_product, with_product], me);
        assert_eq!(groups[0].product_id, Some(product));
    }

    #[test]
    fn drafts_sort_first_and_yield_to_persisted_duplicates() {
        let draft_only = Uuid::new_v4();
        let now_persisted = Uuid::new_v4();

        let drafts = vec![summary(draft_only), summary(now_persisted)];
        let persisted = vec![summary(now_persisted)];

        let merged = merge_drafts(drafts, persisted);
        let ids: Vec<Uuid> = merged.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![draft_only, now_persisted]);
    }
}
