pub mod access;
pub mod forge;
pub mod media;
pub mod responses;
