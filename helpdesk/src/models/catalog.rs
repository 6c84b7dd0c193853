//! Roles, page permissions, floors and areas
//!
//! Administrative catalogs. Each one is a plain CRUD collection whose
//! form is described by a schema.

use super::{Resource, ResourceKind};
use crate::forms::{FieldSpec, FormSchema, Rule, ValidationErrors};
use serde::{Deserialize, Serialize};

/// A role as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoleDraft {
    pub name: String,
    pub description: Option<String>,
}

pub const ROLE_SCHEMA: FormSchema = FormSchema {
    entity: "role",
    fields: &[
        FieldSpec {
            name: "name",
            label: "Name",
            rules: &[Rule::Required, Rule::MaxLength(50)],
        },
        FieldSpec {
            name: "description",
            label: "Description",
            rules: &[Rule::MaxLength(255)],
        },
    ],
};

impl Resource for Role {
    const KIND: ResourceKind = ResourceKind::Roles;

    type Draft = RoleDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &RoleDraft) -> Result<(), ValidationErrors> {
        ROLE_SCHEMA.validate(draft)
    }
}

/// Grants (or denies) a role access to one page path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub role_id: i64,
    pub page_path: String,
    pub can_access: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionDraft {
    pub role_id: i64,
    pub page_path: String,
    pub can_access: bool,
}

pub const PERMISSION_SCHEMA: FormSchema = FormSchema {
    entity: "permission",
    fields: &[
        FieldSpec {
            name: "role_id",
            label: "Role",
            rules: &[Rule::Required, Rule::PositiveId],
        },
        FieldSpec {
            name: "page_path",
            label: "Page",
            rules: &[Rule::Required, Rule::MaxLength(255)],
        },
    ],
};

impl Resource for Permission {
    const KIND: ResourceKind = ResourceKind::Permissions;

    type Draft = PermissionDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &PermissionDraft) -> Result<(), ValidationErrors> {
        PERMISSION_SCHEMA.validate(draft)?;

        if !draft.page_path.starts_with('/') {
            let mut errors = ValidationErrors::new();
            errors.add("page_path", "Page must be an absolute path starting with '/'");
            return Err(errors);
        }

        Ok(())
    }
}

/// A building floor tickets and users are located on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FloorDraft {
    pub name: String,
    pub description: Option<String>,
}

pub const FLOOR_SCHEMA: FormSchema = FormSchema {
    entity: "floor",
    fields: &[
        FieldSpec {
            name: "name",
            label: "Name",
            rules: &[Rule::Required, Rule::MaxLength(100)],
        },
        FieldSpec {
            name: "description",
            label: "Description",
            rules: &[Rule::MaxLength(255)],
        },
    ],
};

impl Resource for Floor {
    const KIND: ResourceKind = ResourceKind::Floors;

    type Draft = FloorDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &FloorDraft) -> Result<(), ValidationErrors> {
        FLOOR_SCHEMA.validate(draft)
    }
}

/// An area within a floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    pub name: String,
    pub floor_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AreaDraft {
    pub name: String,
    pub floor_id: i64,
}

pub const AREA_SCHEMA: FormSchema = FormSchema {
    entity: "area",
    fields: &[
        FieldSpec {
            name: "name",
            label: "Name",
            rules: &[Rule::Required, Rule::MaxLength(100)],
        },
        FieldSpec {
            name: "floor_id",
            label: "Floor",
            rules: &[Rule::Required, Rule::PositiveId],
        },
    ],
};

impl Resource for Area {
    const KIND: ResourceKind = ResourceKind::Areas;

    type Draft = AreaDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &AreaDraft) -> Result<(), ValidationErrors> {
        AREA_SCHEMA.validate(draft)
    }
}
