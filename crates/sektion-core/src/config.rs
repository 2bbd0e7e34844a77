//! Age and cardinality thresholds for membership rules.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Thresholds {
  /// Youngest age at which anyone may hold a membership role. This is the
  /// lower bound of the minor family member range.
  pub minimum_age:       u32,
  /// From this age on a family member counts as an adult.
  pub adult_age:         u32,
  /// Up to and including this age, a non-family joiner is youth.
  pub youth_until_age:   u32,
  /// Adults allowed to share one family membership.
  pub max_family_adults: usize,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      minimum_age:       6,
      adult_age:         18,
      youth_until_age:   21,
      max_family_adults: 2,
    }
  }
}
