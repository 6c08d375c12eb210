//! Weighted quality scoring with diminishing returns.
//!
//! Violations are partitioned by category; within a category the n-th
//! violation (0-indexed) deducts `base(severity) / (1 + 0.3 * n)` points, so
//! repeated low-value issues in one category do not compound linearly to
//! zero. Category scores are combined through a fixed weight table summing
//! to 100, and the overall score maps to a letter grade through an explicit
//! threshold table.
//!
//! The deduction bases (15/8/3), the `0.3` damping factor, the weight
//! tables, and the grade thresholds are compatibility constants: existing
//! shared links and badges depend on them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::Registry;
use crate::types::{Category, RuleCode, Severity, Violation};

/// Damping factor for diminishing returns within a category.
const DAMPING: f64 = 0.3;

/// Fixed category weight table for one tool. Weights sum to 100.
#[derive(Debug, Clone, Copy)]
pub struct WeightTable(&'static [(Category, u32)]);

/// Compose tool weights.
pub const COMPOSE_WEIGHTS: WeightTable = WeightTable(&[
    (Category::Security, 30),
    (Category::Semantic, 25),
    (Category::BestPractice, 20),
    (Category::Schema, 15),
    (Category::Style, 10),
]);

/// Kubernetes tool weights.
pub const K8S_WEIGHTS: WeightTable = WeightTable(&[
    (Category::Security, 30),
    (Category::Reliability, 25),
    (Category::BestPractice, 20),
    (Category::Schema, 15),
    (Category::CrossResource, 10),
]);

impl WeightTable {
    /// Categories in display order with their weights.
    pub fn entries(&self) -> &'static [(Category, u32)] {
        self.0
    }

    /// Weight for a category, or None if the category is not part of
    /// this tool's table.
    pub fn weight(&self, category: Category) -> Option<u32> {
        self.0.iter().find(|(c, _)| *c == category).map(|(_, w)| *w)
    }
}

/// Letter grade derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

/// Explicit ordered threshold table; first matching entry wins.
const GRADE_THRESHOLDS: &[(u32, Grade)] = &[
    (97, Grade::APlus),
    (93, Grade::A),
    (90, Grade::AMinus),
    (87, Grade::BPlus),
    (83, Grade::B),
    (80, Grade::BMinus),
    (77, Grade::CPlus),
    (73, Grade::C),
    (70, Grade::CMinus),
    (67, Grade::DPlus),
    (63, Grade::D),
    (60, Grade::DMinus),
];

impl Grade {
    /// Map an overall score to a grade via the threshold table.
    pub fn from_score(overall: u32) -> Self {
        for (threshold, grade) in GRADE_THRESHOLDS {
            if overall >= *threshold {
                return *grade;
            }
        }
        Grade::F
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::DPlus => "D+",
            Self::D => "D",
            Self::DMinus => "D-",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One violation's contribution to the score, after diminishing returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDeduction {
    pub code: RuleCode,
    pub category: Category,
    pub severity: Severity,
    pub points: f64,
    pub line: u32,
}

/// Score for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    /// 0..=100, rounded to 2 decimals.
    pub score: f64,
    pub weight: u32,
    pub deductions: Vec<ScoreDeduction>,
}

/// The complete score result for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 0..=100.
    pub overall: u32,
    pub grade: Grade,
    pub categories: Vec<CategoryScore>,
    /// All deductions flattened, in category display order.
    pub deductions: Vec<ScoreDeduction>,
}

impl ScoreResult {
    /// Perfect score: no violations at all.
    pub fn perfect(weights: &WeightTable) -> Self {
        let categories = weights
            .entries()
            .iter()
            .map(|(category, weight)| CategoryScore {
                category: *category,
                score: 100.0,
                weight: *weight,
                deductions: Vec::new(),
            })
            .collect();
        Self {
            overall: 100,
            grade: Grade::APlus,
            categories,
            deductions: Vec::new(),
        }
    }

    /// Degraded zero score, used when the document failed to parse.
    pub fn zeroed(weights: &WeightTable) -> Self {
        let categories = weights
            .entries()
            .iter()
            .map(|(category, weight)| CategoryScore {
                category: *category,
                score: 0.0,
                weight: *weight,
                deductions: Vec::new(),
            })
            .collect();
        Self {
            overall: 0,
            grade: Grade::F,
            categories,
            deductions: Vec::new(),
        }
    }
}

/// Round to 2 decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a violation list.
///
/// Pure function of the violation list, the registry (for category lookup),
/// and the static weight table. Violations whose code resolves to no
/// metadata in either registry are ignored for scoring; they still render
/// in the violation list via fallback enrichment.
pub fn score<D>(violations: &[Violation], registry: &Registry<D>, weights: &WeightTable) -> ScoreResult {
    let mut categories = Vec::with_capacity(weights.entries().len());
    let mut flattened = Vec::new();

    for (category, weight) in weights.entries() {
        let mut deductions = Vec::new();

        for violation in violations {
            let Some(meta) = registry.metadata_for(&violation.code) else {
                continue;
            };
            if meta.category != *category {
                continue;
            }
            // n-th violation in this category, 0-indexed.
            let n = deductions.len();
            let points = meta.severity.base_deduction() / (1.0 + DAMPING * n as f64);
            deductions.push(ScoreDeduction {
                code: violation.code.clone(),
                category: *category,
                severity: meta.severity,
                points,
                line: violation.line,
            });
        }

        let total: f64 = deductions.iter().map(|d| d.points).sum();
        let score = round2((100.0 - total).max(0.0));

        flattened.extend(deductions.iter().cloned());
        categories.push(CategoryScore {
            category: *category,
            score,
            weight: *weight,
            deductions,
        });
    }

    let overall = categories
        .iter()
        .map(|c| c.score * c.weight as f64 / 100.0)
        .sum::<f64>()
        .round() as u32;

    ScoreResult {
        overall,
        grade: Grade::from_score(overall),
        categories,
        deductions: flattened,
    }
}
