pub mod blob_locator;
pub mod frame;
pub mod point_cloud;
pub mod window;
