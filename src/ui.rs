pub mod editor;
pub mod gutter;
pub mod title_bar;
pub mod viewport;
