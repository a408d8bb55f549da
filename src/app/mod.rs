pub mod atlas;
pub mod auth;
pub mod comments;
pub mod feed;
pub mod resources;
pub mod search;
