// Comment threads on events, plus comment and reply likes.
//
// Comments are addressed positionally (`comments.$`) through a query
// condition on their uuid. Replies sit one array deeper and are addressed
// with array filters (`comments.$[c].replies.$[r]`).

use chrono::Utc;
use launchpad_common::{fields, AccountRef, Comment, CommentLike, LaunchpadError, RecordId, Reply, Result};
use launchpad_store::{Filter, Update};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{SocialService, ACCOUNTS, EVENTS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    /// Client-chosen id. A fresh one is generated when absent.
    #[serde(default)]
    pub uuid: Option<String>,
    pub author_ref: AccountRef,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
    #[serde(default)]
    pub uuid: Option<String>,
    pub author_ref: AccountRef,
    pub content: String,
}

fn fresh_uuid(requested: Option<String>) -> String {
    requested
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn comment_path(field: &str) -> String {
    format!("{}.$.{field}", fields::COMMENTS)
}

fn reply_likes_path() -> String {
    format!(
        "{}.$[c].{}.$[r].{}",
        fields::COMMENTS,
        fields::REPLIES,
        fields::LIKED_BY
    )
}

impl SocialService {
    /// Append a comment. Set semantics on `uuid`: resubmitting the same uuid,
    /// or one any comment or reply on the event ever held, is reported as
    /// [`LaunchpadError::NoUpdate`].
    pub async fn add_comment(&self, event: &RecordId, input: NewComment) -> Result<Comment> {
        let comment = Comment {
            uuid: fresh_uuid(input.uuid),
            author_ref: input.author_ref,
            content: input.content,
            created_at: Utc::now(),
            liked_by: Vec::new(),
            replies: Vec::new(),
        };

        let filter = Filter::id(event)
            .and(Filter::not_contains(fields::THREAD_UUIDS, comment.uuid.as_str()))
            .and(Filter::no_elem_match(fields::COMMENTS, fields::UUID, comment.uuid.as_str()));
        let update = Update::new()
            .push(fields::COMMENTS, json!(comment))
            .add_to_set(fields::THREAD_UUIDS, comment.uuid.as_str());
        let result = self.store.update_one(EVENTS, &filter, &update).await?;

        if result.modified == 0 {
            // Distinguish a missing event from a taken uuid.
            self.load_event(event).await?;
            return Err(LaunchpadError::NoUpdate(format!("comment {} already exists", comment.uuid)));
        }
        info!(%event, comment = %comment.uuid, "Comment added");
        Ok(comment)
    }

    pub async fn delete_comment(&self, event: &RecordId, comment_uuid: &str) -> Result<()> {
        let filter = Filter::id(event).and(Filter::elem_match(fields::COMMENTS, fields::UUID, comment_uuid));
        let update = Update::new().pull_where(fields::COMMENTS, fields::UUID, comment_uuid);
        let result = self.store.update_one(EVENTS, &filter, &update).await?;

        if result.modified == 0 {
            self.load_event(event).await?;
            return Err(LaunchpadError::NotFound(format!("comment {comment_uuid}")));
        }
        info!(%event, comment = %comment_uuid, "Comment deleted");
        Ok(())
    }

    /// Like the comment, or unlike it if the account already does. Returns
    /// whether the account likes it afterwards.
    pub async fn toggle_like_comment(&self, event: &RecordId, comment_uuid: &str, account: &AccountRef) -> Result<bool> {
        let record = self.load_event(event).await?;
        let comment = record
            .comment(comment_uuid)
            .ok_or_else(|| LaunchpadError::NotFound(format!("comment {comment_uuid}")))?;
        let liked = comment.liked_by.contains(account);

        let path = comment_path(fields::LIKED_BY);
        let update = if liked {
            Update::new().pull(path, account.as_str())
        } else {
            Update::new().add_to_set(path, account.as_str())
        };
        let filter = Filter::id(event).and(Filter::elem_match(fields::COMMENTS, fields::UUID, comment_uuid));
        let result = self.store.update_one(EVENTS, &filter, &update).await?;
        if result.modified == 0 {
            return Err(LaunchpadError::NoUpdate(format!("like on comment {comment_uuid}")));
        }

        let mirror = CommentLike {
            event_ref: event.clone(),
            comment_uuid: comment_uuid.to_string(),
            reply_uuid: None,
        };
        self.mirror_like(account, &mirror, !liked).await;
        Ok(!liked)
    }

    /// Append a reply under an existing comment. Reply uuids are unique across
    /// the whole event, so `toggle_like_reply` can address them by uuid alone.
    pub async fn add_reply(&self, event: &RecordId, comment_uuid: &str, input: NewReply) -> Result<Reply> {
        let record = self.load_event(event).await?;
        if record.comment(comment_uuid).is_none() {
            return Err(LaunchpadError::NotFound(format!("comment {comment_uuid}")));
        }

        let reply = Reply {
            uuid: fresh_uuid(input.uuid),
            parent_comment_uuid: comment_uuid.to_string(),
            author_ref: input.author_ref,
            content: input.content,
            created_at: Utc::now(),
            liked_by: Vec::new(),
        };
        if record.uuid_taken(&reply.uuid) {
            return Err(LaunchpadError::NoUpdate(format!("reply {} already exists", reply.uuid)));
        }

        // Guarded in the query: concurrent submissions of one uuid land once.
        let filter = Filter::id(event)
            .and(Filter::elem_match(fields::COMMENTS, fields::UUID, comment_uuid))
            .and(Filter::not_contains(fields::THREAD_UUIDS, reply.uuid.as_str()));
        let update = Update::new()
            .push(comment_path(fields::REPLIES), json!(reply))
            .add_to_set(fields::THREAD_UUIDS, reply.uuid.as_str());
        let result = self.store.update_one(EVENTS, &filter, &update).await?;

        if result.modified == 0 {
            let current = self.load_event(event).await?;
            if current.comment(comment_uuid).is_none() {
                return Err(LaunchpadError::NotFound(format!("comment {comment_uuid}")));
            }
            return Err(LaunchpadError::NoUpdate(format!("reply {} already exists", reply.uuid)));
        }
        info!(%event, comment = %comment_uuid, reply = %reply.uuid, "Reply added");
        Ok(reply)
    }

    pub async fn delete_reply(&self, event: &RecordId, comment_uuid: &str, reply_uuid: &str) -> Result<()> {
        let filter = Filter::id(event).and(Filter::elem_match(fields::COMMENTS, fields::UUID, comment_uuid));
        let update = Update::new()
            .pull_where(format!("{}.$[c].{}", fields::COMMENTS, fields::REPLIES), fields::UUID, reply_uuid)
            .array_filter("c", fields::UUID, comment_uuid);
        let result = self.store.update_one(EVENTS, &filter, &update).await?;

        if result.matched == 0 {
            self.load_event(event).await?;
            return Err(LaunchpadError::NotFound(format!("comment {comment_uuid}")));
        }
        if result.modified == 0 {
            return Err(LaunchpadError::NotFound(format!("reply {reply_uuid}")));
        }
        info!(%event, comment = %comment_uuid, reply = %reply_uuid, "Reply deleted");
        Ok(())
    }

    /// Like or unlike a reply. The parent comment is found by scanning every
    /// comment's replies.
    pub async fn toggle_like_reply(&self, event: &RecordId, reply_uuid: &str, account: &AccountRef) -> Result<bool> {
        let record = self.load_event(event).await?;
        let (comment, reply) = record
            .find_reply(reply_uuid)
            .ok_or_else(|| LaunchpadError::NotFound(format!("reply {reply_uuid}")))?;
        let liked = reply.liked_by.contains(account);
        let comment_uuid = comment.uuid.clone();

        let update = if liked {
            Update::new().pull(reply_likes_path(), account.as_str())
        } else {
            Update::new().add_to_set(reply_likes_path(), account.as_str())
        };
        let update = update
            .array_filter("c", fields::UUID, comment_uuid.as_str())
            .array_filter("r", fields::UUID, reply_uuid);

        let result = self.store.update_one(EVENTS, &Filter::id(event), &update).await?;
        if result.modified == 0 {
            return Err(LaunchpadError::NoUpdate(format!("like on reply {reply_uuid}")));
        }

        let mirror = CommentLike {
            event_ref: event.clone(),
            comment_uuid,
            reply_uuid: Some(reply_uuid.to_string()),
        };
        self.mirror_like(account, &mirror, !liked).await;
        Ok(!liked)
    }

    /// Best-effort write of the like onto the account. Failures are logged and
    /// never reach the caller.
    async fn mirror_like(&self, account: &AccountRef, like: &CommentLike, liked: bool) {
        let value = json!(like);
        let update = if liked {
            Update::new().add_to_set(fields::LIKED_COMMENTS, value)
        } else {
            Update::new().pull(fields::LIKED_COMMENTS, value)
        };

        match self
            .store
            .update_one(ACCOUNTS, &Self::account_filter(account.as_str()), &update)
            .await
        {
            Ok(result) if result.matched == 0 => {
                debug!(%account, "No account document to mirror like onto")
            }
            Ok(_) => {}
            Err(e) => warn!(%account, comment = %like.comment_uuid, error = %e, "Failed to mirror like on account"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_uuid_is_kept() {
        assert_eq!(fresh_uuid(Some("c1".into())), "c1");
    }

    #[test]
    fn blank_or_missing_uuid_is_generated() {
        assert_eq!(fresh_uuid(None).len(), 36);
        assert_eq!(fresh_uuid(Some("  ".into())).len(), 36);
    }

    #[test]
    fn reply_like_path_uses_both_filters() {
        assert_eq!(reply_likes_path(), "comments.$[c].replies.$[r].likedBy");
        assert_eq!(comment_path("likedBy"), "comments.$.likedBy");
    }
}
