pub mod chat;
pub mod media;
pub mod playback;
pub mod provider_instance;
pub mod room;
pub mod room_member;
pub mod settings;
pub mod user;
pub mod user_oauth_provider;

pub use chat::ChatRepository;
pub use media::MediaRepository;
pub use playback::RoomPlaybackStateRepository;
pub use provider_instance::{ProviderInstanceRepository, UserProviderCredentialRepository};
pub use room::RoomRepository;
pub use room_member::RoomMemberRepository;
pub use settings::SettingsRepository;
pub use user::UserRepository;
pub use user_oauth_provider::UserOAuthProviderRepository;
