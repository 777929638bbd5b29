pub type Matrix = Vec<Vec<f64>>;

/// Heritability fit for one phenotype, possibly partitioned over categories.
#[derive(Debug, Clone)]
pub struct Hsq {
    /// Per-SNP heritability (tau) for each category.
    pub coef: Vec<f64>,
    pub coef_se: Vec<f64>,
    pub coef_cov: Matrix,
    /// Heritability attributed to each category (`coef * M`).
    pub cat: Vec<f64>,
    pub cat_se: Vec<f64>,
    pub cat_cov: Matrix,
    pub tot: f64,
    pub tot_se: f64,
    pub prop: Vec<f64>,
    pub prop_se: Vec<f64>,
    pub prop_cov: Matrix,
    pub intercept: f64,
    /// `None` when the intercept was fixed rather than estimated.
    pub intercept_se: Option<f64>,
    pub mean_chisq: f64,
    pub lambda_gc: f64,
    pub n_bar: f64,
    pub n_blocks: usize,
    /// One row per jackknife block; category slopes then the intercept.
    pub delete_values: Matrix,
    pub tot_delete_values: Vec<f64>,
}

impl Hsq {
    /// `(intercept - 1) / (mean_chisq - 1)`; undefined unless mean chi^2 > 1.
    pub fn ratio(&self) -> Option<(f64, Option<f64>)> {
        if self.mean_chisq <= 1.0 {
            return None;
        }
        let denom = self.mean_chisq - 1.0;
        Some((
            (self.intercept - 1.0) / denom,
            self.intercept_se.map(|se| se / denom),
        ))
    }
}

/// Genetic covariance fit between two phenotypes.
#[derive(Debug, Clone)]
pub struct Gencov {
    pub coef: Vec<f64>,
    pub coef_se: Vec<f64>,
    pub coef_cov: Matrix,
    pub cat: Vec<f64>,
    pub cat_se: Vec<f64>,
    pub cat_cov: Matrix,
    pub tot: f64,
    pub tot_se: f64,
    pub intercept: f64,
    pub intercept_se: Option<f64>,
    pub mean_z1z2: f64,
    pub n_bar: f64,
    pub n_blocks: usize,
    pub delete_values: Matrix,
    pub tot_delete_values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct RgEstimate {
    pub hsq1: Hsq,
    pub hsq2: Hsq,
    pub gencov: Gencov,
    pub rg: f64,
    pub rg_se: f64,
    pub z: f64,
    pub p: f64,
}

/// Result of one phenotype pair in an rg batch.
#[derive(Debug, Clone)]
pub enum RgOutcome {
    Succeeded {
        rg: f64,
        se: f64,
        z: f64,
        p: f64,
    },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RgComparison {
    pub p1: String,
    pub p2: String,
    pub outcome: RgOutcome,
}

impl RgComparison {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RgOutcome::Succeeded { .. })
    }
}
