//! Saved ticket filters
//!
//! A filter is an ordered list of criteria. Each criterion after the
//! first carries the logical operator that joins it to the result of
//! everything before it, so `a AND b OR c` means `((a AND b) OR c)`.
//! The backend evaluates filters; the client only builds, validates
//! and describes them.

use super::{Resource, ResourceKind};
use crate::config::{MAX_FILTER_DESCRIPTION_LENGTH, MAX_FILTER_NAME_LENGTH};
use crate::forms::ValidationErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket fields a criterion can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Status,
    Priority,
    Title,
    Description,
    CreatedBy,
    AssignedTo,
    FloorId,
    AreaId,
    CreatedAt,
    UpdatedAt,
}

impl FilterField {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterField::Status => "status",
            FilterField::Priority => "priority",
            FilterField::Title => "title",
            FilterField::Description => "description",
            FilterField::CreatedBy => "created_by",
            FilterField::AssignedTo => "assigned_to",
            FilterField::FloorId => "floor_id",
            FilterField::AreaId => "area_id",
            FilterField::CreatedAt => "created_at",
            FilterField::UpdatedAt => "updated_at",
        }
    }
}

/// Comparison applied by a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThanOrEqual,
        Operator::In,
        Operator::NotIn,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// IS_NULL and IS_NOT_NULL take no value; everything else needs one
    pub fn requires_value(self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    fn symbol(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOT CONTAINS",
            Operator::StartsWith => "STARTS WITH",
            Operator::EndsWith => "ENDS WITH",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThanOrEqual => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// Connective joining a criterion to the running result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

/// A stored criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: i64,
    pub field_name: FilterField,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub logical_operator: Option<LogicalOperator>,
}

/// A saved filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub id: i64,
    pub filter_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_system_default: bool,
    #[serde(rename = "filterCriteria", default)]
    pub filter_criteria: Vec<Criterion>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Filter {
    /// Human-readable rendering of the criteria fold
    pub fn describe(&self) -> String {
        describe_fold(self.filter_criteria.iter().map(|c| {
            (
                c.field_name,
                c.operator,
                c.value.as_deref().unwrap_or(""),
                c.logical_operator,
            )
        }))
    }

    /// Editable copy of this filter
    pub fn to_draft(&self) -> FilterDraft {
        FilterDraft {
            filter_name: self.filter_name.clone(),
            description: self.description.clone(),
            is_public: self.is_public,
            criteria: self
                .filter_criteria
                .iter()
                .map(|c| CriterionDraft {
                    field_name: c.field_name,
                    operator: c.operator,
                    value: c.value.clone().unwrap_or_default(),
                    logical_operator: c.logical_operator,
                })
                .collect(),
        }
    }
}

/// A criterion as edited in the composer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionDraft {
    pub field_name: FilterField,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

impl CriterionDraft {
    pub fn new(field_name: FilterField, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field_name,
            operator,
            value: value.into(),
            logical_operator: None,
        }
    }

    pub fn joined_by(mut self, logical_operator: LogicalOperator) -> Self {
        self.logical_operator = Some(logical_operator);
        self
    }
}

/// Create/edit payload for a filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDraft {
    pub filter_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(rename = "filterCriteria", default)]
    pub criteria: Vec<CriterionDraft>,
}

impl FilterDraft {
    pub fn new(filter_name: impl Into<String>) -> Self {
        Self {
            filter_name: filter_name.into(),
            ..Self::default()
        }
    }

    pub fn with_criterion(mut self, criterion: CriterionDraft) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Canonical form sent to the backend.
    ///
    /// The first criterion never carries a connective, later ones
    /// default to AND, names and values are trimmed, and null checks
    /// drop their value.
    pub fn normalized(&self) -> FilterDraft {
        let criteria = self
            .criteria
            .iter()
            .enumerate()
            .map(|(index, c)| CriterionDraft {
                field_name: c.field_name,
                operator: c.operator,
                value: if c.operator.requires_value() {
                    c.value.trim().to_string()
                } else {
                    String::new()
                },
                logical_operator: if index == 0 {
                    None
                } else {
                    Some(c.logical_operator.unwrap_or_default())
                },
            })
            .collect();

        FilterDraft {
            filter_name: self.filter_name.trim().to_string(),
            description: self
                .description
                .as_ref()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            is_public: self.is_public,
            criteria,
        }
    }

    /// Submission-time validation
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.filter_name.trim();
        if name.is_empty() {
            errors.add("filter_name", "Filter name is required");
        } else if name.chars().count() > MAX_FILTER_NAME_LENGTH {
            errors.add(
                "filter_name",
                format!(
                    "Filter name must be at most {} characters",
                    MAX_FILTER_NAME_LENGTH
                ),
            );
        }

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_FILTER_DESCRIPTION_LENGTH {
                errors.add(
                    "description",
                    format!(
                        "Description must be at most {} characters",
                        MAX_FILTER_DESCRIPTION_LENGTH
                    ),
                );
            }
        }

        if self.criteria.is_empty() {
            errors.add("criteria", "At least one criterion is required");
        }

        for (index, criterion) in self.criteria.iter().enumerate() {
            if criterion.operator.requires_value() && criterion.value.trim().is_empty() {
                errors.add(
                    format!("criteria[{}].value", index),
                    "A value is required for this operator",
                );
            }
        }

        errors.into_result()
    }

    /// Human-readable rendering of the criteria fold
    pub fn describe(&self) -> String {
        describe_fold(self.criteria.iter().map(|c| {
            (
                c.field_name,
                c.operator,
                c.value.as_str(),
                c.logical_operator,
            )
        }))
    }
}

impl Resource for Filter {
    const KIND: ResourceKind = ResourceKind::Filters;

    type Draft = FilterDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &FilterDraft) -> Result<(), ValidationErrors> {
        draft.validate()
    }
}

/// Marks a filter as a favorite of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFavFilter {
    pub id: i64,
    pub user_id: i64,
    pub filter_id: i64,
}

/// Left-to-right fold: every step wraps the running expression.
fn describe_fold<'a, I>(criteria: I) -> String
where
    I: Iterator<Item = (FilterField, Operator, &'a str, Option<LogicalOperator>)>,
{
    let mut expression: Option<String> = None;

    for (field, operator, value, logical) in criteria {
        let clause = if operator.requires_value() {
            format!("{} {} '{}'", field.as_str(), operator.symbol(), value.trim())
        } else {
            format!("{} {}", field.as_str(), operator.symbol())
        };

        expression = Some(match expression {
            None => clause,
            Some(running) => format!("({} {} {})", running, logical.unwrap_or_default(), clause),
        });
    }

    expression.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_open() -> CriterionDraft {
        CriterionDraft::new(FilterField::Status, Operator::Equals, "Abierto")
    }

    #[test]
    fn test_null_operators_accept_empty_value() {
        for operator in [Operator::IsNull, Operator::IsNotNull] {
            let draft = FilterDraft::new("Unassigned")
                .with_criterion(CriterionDraft::new(FilterField::AssignedTo, operator, ""));
            assert!(draft.validate().is_ok(), "{:?} should not need a value", operator);
        }
    }

    #[test]
    fn test_value_operators_reject_empty_value() {
        for operator in Operator::ALL.into_iter().filter(|op| op.requires_value()) {
            let draft = FilterDraft::new("Broken")
                .with_criterion(CriterionDraft::new(FilterField::Title, operator, "   "));
            let errors = draft.validate().unwrap_err();
            assert_eq!(
                errors.for_field("criteria[0].value"),
                Some("A value is required for this operator"),
                "{:?} should require a value",
                operator
            );
        }
    }

    #[test]
    fn test_zero_criteria_rejected() {
        let errors = FilterDraft::new("Empty").validate().unwrap_err();
        assert!(errors.for_field("criteria").is_some());
    }

    #[test]
    fn test_name_required_and_bounded() {
        let blank = FilterDraft::new("  ").with_criterion(status_open());
        assert!(blank.validate().unwrap_err().for_field("filter_name").is_some());

        let long = FilterDraft::new("x".repeat(MAX_FILTER_NAME_LENGTH + 1)).with_criterion(status_open());
        assert!(long.validate().unwrap_err().for_field("filter_name").is_some());

        let max = FilterDraft::new("x".repeat(MAX_FILTER_NAME_LENGTH)).with_criterion(status_open());
        assert!(max.validate().is_ok());
    }

    #[test]
    fn test_error_points_at_offending_criterion() {
        let draft = FilterDraft::new("Mixed")
            .with_criterion(status_open())
            .with_criterion(
                CriterionDraft::new(FilterField::Priority, Operator::In, "")
                    .joined_by(LogicalOperator::Or),
            );
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.for_field("criteria[1].value").is_some());
    }

    #[test]
    fn test_normalized_sets_connectives() {
        let draft = FilterDraft::new("  Mine  ")
            .with_criterion(status_open().joined_by(LogicalOperator::Or))
            .with_criterion(CriterionDraft::new(FilterField::AssignedTo, Operator::IsNull, "junk"))
            .with_criterion(
                CriterionDraft::new(FilterField::Priority, Operator::Equals, " Alta ")
                    .joined_by(LogicalOperator::Or),
            );

        let normalized = draft.normalized();

        assert_eq!(normalized.filter_name, "Mine");
        assert_eq!(normalized.criteria[0].logical_operator, None);
        assert_eq!(normalized.criteria[1].logical_operator, Some(LogicalOperator::And));
        assert_eq!(normalized.criteria[1].value, "");
        assert_eq!(normalized.criteria[2].logical_operator, Some(LogicalOperator::Or));
        assert_eq!(normalized.criteria[2].value, "Alta");
    }

    #[test]
    fn test_describe_is_left_to_right_fold() {
        let draft = FilterDraft::new("Fold")
            .with_criterion(status_open())
            .with_criterion(
                CriterionDraft::new(FilterField::Priority, Operator::Equals, "Alta")
                    .joined_by(LogicalOperator::And),
            )
            .with_criterion(
                CriterionDraft::new(FilterField::AssignedTo, Operator::IsNull, "")
                    .joined_by(LogicalOperator::Or),
            );

        assert_eq!(
            draft.describe(),
            "((status = 'Abierto' AND priority = 'Alta') OR assigned_to IS NULL)"
        );
    }

    #[test]
    fn test_wire_format() {
        let draft = FilterDraft::new("Wire")
            .with_criterion(status_open())
            .with_criterion(
                CriterionDraft::new(FilterField::FloorId, Operator::NotIn, "1,2")
                    .joined_by(LogicalOperator::Or),
            )
            .normalized();

        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["filterCriteria"][0]["field_name"], "status");
        assert_eq!(json["filterCriteria"][0]["operator"], "EQUALS");
        assert!(json["filterCriteria"][0].get("logical_operator").is_none());
        assert_eq!(json["filterCriteria"][1]["operator"], "NOT_IN");
        assert_eq!(json["filterCriteria"][1]["logical_operator"], "OR");
    }

    #[test]
    fn test_stored_filter_round_trips_to_draft() {
        let json = r#"{
            "id": 4,
            "filter_name": "Open high",
            "description": null,
            "is_public": true,
            "is_system_default": false,
            "filterCriteria": [
                {"id": 1, "field_name": "status", "operator": "EQUALS", "value": "Abierto", "logical_operator": null},
                {"id": 2, "field_name": "priority", "operator": "GREATER_THAN_OR_EQUAL", "value": "2", "logical_operator": "AND"}
            ],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        }"#;
        let filter: Filter = serde_json::from_str(json).unwrap();

        assert_eq!(filter.describe(), "(status = 'Abierto' AND priority >= '2')");
        let draft = filter.to_draft();
        assert!(draft.validate().is_ok());
        assert_eq!(draft.criteria.len(), 2);
    }
}
