use rocket::FromForm;

use crate::error::AppError;

pub const MAX_TOP: i64 = 1000;
pub const MAX_ORDERBY_LEN: usize = 1024;
pub const MAX_ORDER_FIELDS: usize = 10;

/// Query string accepted by the list endpoints.
///
/// `procedureId` and `userId` are equality filters; entities without the
/// column reject them. `$orderby` takes `Field [asc|desc]` clauses separated by
/// commas, `$top`/`$skip` page the result.
#[derive(FromForm, Debug, Default, Clone)]
pub struct ListParams {
    #[field(name = "procedureId")]
    pub procedure_id: Option<i64>,
    #[field(name = "userId")]
    pub user_id: Option<i64>,
    #[field(name = "$orderby")]
    pub orderby: Option<String>,
    #[field(name = "$top")]
    pub top: Option<i64>,
    #[field(name = "$skip")]
    pub skip: Option<i64>,
    #[field(name = "$expand")]
    pub expand: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub column: &'static str,
    pub dir: SortDir,
}

/// Parses `$orderby` against the columns an entity allows.
///
/// Field names match case-insensitively and resolve to the canonical column
/// name, so the returned keys are safe to splice into SQL.
pub fn parse_orderby(raw: &str, allowed: &[&'static str]) -> Result<Vec<OrderKey>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    if raw.len() > MAX_ORDERBY_LEN {
        return Err(AppError::Validation("$orderby too long".to_string()));
    }

    let mut keys = Vec::new();

    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let tokens: Vec<String> = part.split_whitespace().map(str::to_lowercase).collect();
        let (field, dir) = match tokens.as_slice() {
            [field] => (field.as_str(), SortDir::Asc),
            [field, dir] if dir == "asc" => (field.as_str(), SortDir::Asc),
            [field, dir] if dir == "desc" => (field.as_str(), SortDir::Desc),
            _ => {
                return Err(AppError::Validation(format!(
                    "invalid $orderby clause: {}",
                    part
                )));
            }
        };

        let column = allowed
            .iter()
            .find(|column| column.eq_ignore_ascii_case(field))
            .copied()
            .ok_or_else(|| AppError::Validation(format!("unknown $orderby field: {}", field)))?;

        keys.push(OrderKey { column, dir });
    }

    if keys.len() > MAX_ORDER_FIELDS {
        return Err(AppError::Validation("too many $orderby fields".to_string()));
    }

    Ok(keys)
}

/// Validated paging window. `limit` of `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Page {
    pub fn from_params(top: Option<i64>, skip: Option<i64>) -> Result<Self, AppError> {
        if let Some(top) = top {
            if !(0..=MAX_TOP).contains(&top) {
                return Err(AppError::Validation(format!(
                    "$top must be between 0 and {}",
                    MAX_TOP
                )));
            }
        }

        let offset = skip.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::Validation("$skip must not be negative".to_string()));
        }

        Ok(Self { limit: top, offset })
    }
}

impl ListParams {
    pub fn page(&self) -> Result<Page, AppError> {
        Page::from_params(self.top, self.skip)
    }

    pub fn order(&self, allowed: &[&'static str]) -> Result<Vec<OrderKey>, AppError> {
        match &self.orderby {
            Some(raw) => parse_orderby(raw, allowed),
            None => Ok(Vec::new()),
        }
    }

    /// Resolves `$expand` against the relations an entity offers. Unknown
    /// relations are rejected like unknown `$orderby` fields.
    pub fn expansions(&self, allowed: &[&'static str]) -> Result<Vec<&'static str>, AppError> {
        let Some(raw) = self.expand.as_deref() else {
            return Ok(Vec::new());
        };

        let mut relations = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let relation = allowed
                .iter()
                .find(|relation| relation.eq_ignore_ascii_case(part))
                .copied()
                .ok_or_else(|| AppError::Validation(format!("unknown $expand relation: {}", part)))?;

            if !relations.contains(&relation) {
                relations.push(relation);
            }
        }

        Ok(relations)
    }
}
