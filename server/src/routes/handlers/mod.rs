pub mod weekly;
