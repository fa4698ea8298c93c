//! SubmissionPackage entity model
//!
//! One row per report line: the join between a submission and a package
//! identity, annotated with the reported usage status. Status counts are
//! always derived by counting these rows.

use super::package::Entity as Package;
use super::submission::Entity as Submission;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submission_packages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub submission_id: i32,

    pub package_id: i32,

    /// One of `voted`, `recent`, `old`, `nofiles`
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Submission",
        from = "Column::SubmissionId",
        to = "super::submission::Column::Id"
    )]
    Submission,
    #[sea_orm(
        belongs_to = "Package",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
}

impl Related<Submission> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl Related<Package> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
