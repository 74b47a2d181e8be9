pub mod audit_logs;
pub mod order_line_items;
pub mod orders;
pub mod products;
pub mod user_profiles;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use order_line_items::Entity as OrderLineItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use user_profiles::Entity as UserProfiles;
pub use users::Entity as Users;
