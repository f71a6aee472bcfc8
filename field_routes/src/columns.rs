//! Discovery of the column roles from the headers of an upload.
//!
//! Every role has an ordered list of keywords. For each keyword in turn, the
//! first header that contains it (ignoring case) is assigned to the role.
//! There is no scoring: the first match wins. Two roles may end up on the
//! same header, which happens when a file has a single pair of coordinates.

use std::collections::BTreeMap;

use log::debug;
use snafu::ensure;

use crate::config::*;

/// The keywords associated to one role, by decreasing priority.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnRule {
    pub role: Role,
    pub keywords: Vec<String>,
}

const DEFAULT_KEYWORDS: [(Role, &[&str]); 11] = [
    (Role::PunchLat, &["punch in lat", "latitude", "lat"]),
    (Role::PunchLon, &["punch in long", "longitude", "lon"]),
    (Role::VisitLat, &["visit lat", "latitude", "lat"]),
    (Role::VisitLon, &["visit long", "longitude", "lon"]),
    (Role::PunchTime, &["punch in time", "time", "punch_time"]),
    (Role::VisitTime, &["visit time", "time of visit", "visit_time"]),
    (Role::PunchDate, &["punch in date", "date", "punch_date"]),
    (Role::VisitDate, &["visit date", "date", "visit_date"]),
    (Role::EmployeeName, &["employee name", "name"]),
    (Role::OutletName, &["outlet name"]),
    (Role::OutletID, &["outlet id"]),
];

/// The header assigned to each role, if any.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ColumnRoleMap {
    columns: BTreeMap<Role, String>,
}

impl ColumnRoleMap {
    pub fn get(&self, role: Role) -> Option<&str> {
        self.columns.get(&role).map(|s| s.as_str())
    }

    pub fn insert(&mut self, role: Role, header: &str) {
        self.columns.insert(role, header.to_string());
    }

    /// The mandatory roles without a header, in the canonical role order.
    pub fn missing_mandatory(&self) -> Vec<Role> {
        Role::ALL
            .iter()
            .filter(|r| r.is_mandatory() && !self.columns.contains_key(r))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.columns.iter().map(|(r, h)| (*r, h.as_str()))
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnResolver {
    rules: Vec<ColumnRule>,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        let rules = DEFAULT_KEYWORDS
            .iter()
            .map(|(role, kws)| ColumnRule {
                role: *role,
                keywords: kws.iter().map(|s| s.to_string()).collect(),
            })
            .collect();
        ColumnResolver { rules }
    }
}

impl ColumnResolver {
    pub fn new(rules: Vec<ColumnRule>) -> ColumnResolver {
        ColumnResolver { rules }
    }

    /// Adds keywords for a role. They are tried before the existing ones.
    pub fn with_keywords(mut self, role: Role, keywords: &[String]) -> ColumnResolver {
        let extra: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        match self.rules.iter_mut().find(|r| r.role == role) {
            Some(rule) => {
                let mut kws = extra;
                kws.extend(rule.keywords.drain(..));
                rule.keywords = kws;
            }
            None => self.rules.push(ColumnRule {
                role,
                keywords: extra,
            }),
        }
        self
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    pub fn resolve_role(&self, role: Role, headers: &[String]) -> Option<String> {
        let rule = self.rules.iter().find(|r| r.role == role)?;
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        for kw in rule.keywords.iter() {
            let kw = kw.to_lowercase();
            if let Some(idx) = lowered.iter().position(|h| h.contains(&kw)) {
                return Some(headers[idx].clone());
            }
        }
        None
    }

    /// Resolves all the roles that can be resolved.
    pub fn resolve(&self, headers: &[String]) -> ColumnRoleMap {
        let mut res = ColumnRoleMap::default();
        for role in Role::ALL.iter() {
            if let Some(h) = self.resolve_role(*role, headers) {
                debug!("resolve: {} -> {:?}", role, h);
                res.insert(*role, &h);
            }
        }
        res
    }

    /// Resolves the roles and fails if a mandatory role is missing.
    ///
    /// The error lists the missing roles and all the headers, verbatim.
    pub fn resolve_mandatory(&self, headers: &[String]) -> Result<ColumnRoleMap, RouteError> {
        let res = self.resolve(headers);
        let missing = res.missing_mandatory();
        ensure!(
            missing.is_empty(),
            MissingColumnsSnafu {
                missing,
                detected: headers.to_vec(),
            }
        );
        Ok(res)
    }
}
