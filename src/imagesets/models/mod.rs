pub mod metadata;
pub mod study;
pub mod work_item;
