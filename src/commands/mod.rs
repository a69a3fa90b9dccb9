mod community_cmd;
mod library_cmd;

pub use community_cmd::CommunityCommand;
pub use library_cmd::LibraryCommand;
