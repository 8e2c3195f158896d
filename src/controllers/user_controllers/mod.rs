pub mod list_users;
