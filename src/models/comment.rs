use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CommentId, TaskId, UserId};

/// Payload for creating or editing a comment.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
}

/// A comment attached to exactly one task.
///
/// Comments have no roles of their own; access follows the parent task.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(input: CommentInput, task_id: TaskId, author_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            author_id,
            body: input.body,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_points_at_parent_task() {
        let task_id = Uuid::new_v4();
        let comment = Comment::new(
            CommentInput {
                body: "looks good".into(),
            },
            task_id,
            7,
        );
        assert_eq!(comment.task_id, task_id);
        assert_eq!(comment.author_id, 7);
        assert_eq!(comment.body, "looks good");
    }

    #[test]
    fn test_comment_validation() {
        assert!(CommentInput { body: "ok".into() }.validate().is_ok());
        assert!(CommentInput { body: "".into() }.validate().is_err());
        assert!(CommentInput {
            body: "x".repeat(2001)
        }
        .validate()
        .is_err());
    }
}
