pub mod comment;
pub mod task;
pub mod user;

use uuid::Uuid;

pub use comment::{Comment, CommentInput};
pub use task::{Task, TaskInput, TaskPriority, TaskStatus};
pub use user::{User, UserCredentials};

/// Identifier of a registered user.
pub type UserId = i32;
/// Identifier of a task.
pub type TaskId = Uuid;
/// Identifier of a comment.
pub type CommentId = Uuid;
