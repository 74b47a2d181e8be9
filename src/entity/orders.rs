use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_profile_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub town_or_city: Option<String>,
    pub street_address1: Option<String>,
    pub street_address2: Option<String>,
    pub county: Option<String>,
    pub date: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Decimal(Some((6, 2)))")]
    pub delivery_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub order_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub grand_total: Decimal,
    #[sea_orm(column_type = "Text")]
    pub original_bag: String,
    #[sea_orm(unique)]
    pub stripe_pid: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_profiles::Entity",
        from = "Column::UserProfileId",
        to = "super::user_profiles::Column::Id",
        on_delete = "SetNull"
    )]
    UserProfiles,
    #[sea_orm(has_many = "super::order_line_items::Entity")]
    OrderLineItems,
}

impl Related<super::user_profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserProfiles.def()
    }
}

impl Related<super::order_line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
