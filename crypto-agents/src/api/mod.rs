pub mod huggingface;
pub mod social_media;
pub mod voice;

pub use huggingface::HuggingFaceModel;
pub use social_media::{collect_posts, PostSource, RetryPolicy, SocialMediaClient, SocialPost};
pub use voice::{Announcer, VoiceAnnouncer};
