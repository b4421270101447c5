//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod allocation_line;
pub mod delivery;
pub mod donation;
pub mod donation_transaction;
pub mod enums;
pub mod meal;
pub mod notification;
pub mod product;
pub mod request_need;
pub mod user;

// Re-export specific types to avoid conflicts
pub use allocation_line::{
    Column as AllocationLineColumn, Entity as AllocationLine, Model as AllocationLineModel,
};
pub use delivery::{Column as DeliveryColumn, Entity as Delivery, Model as DeliveryModel};
pub use donation::{Column as DonationColumn, Entity as Donation, Model as DonationModel};
pub use donation_transaction::{
    Column as DonationTransactionColumn, Entity as DonationTransaction,
    Model as DonationTransactionModel,
};
pub use enums::{
    AdminApproval, Category, DeliveryStatus, DonationStatus, RequestStatus, TransactionStatus,
    UserRole,
};
pub use meal::{Column as MealColumn, Entity as Meal, Model as MealModel};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use request_need::{
    Column as RequestNeedColumn, Entity as RequestNeed, Model as RequestNeedModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
