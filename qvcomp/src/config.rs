use crate::alphabet::{Alphabet, MAX_ALPHABET_SIZE};
use crate::clustering::DEFAULT_MOVEMENT_THRESHOLD;
use crate::distortion::{DistortionMetric, DistortionTable};
use crate::error::{CodebookError, CodebookResult};
use crate::qual::DEFAULT_ALPHABET_SIZE;

/// Codebook generation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CodebookConfig {
    alphabet_size: usize,
    distortion: DistortionMetric,
    comp: f64,
    clusters: usize,
    cluster_threshold: f64,
}

impl CodebookConfig {
    /// Returns a new builder for `CodebookConfig`.
    ///
    /// # Examples
    /// ```
    /// use qvcomp::config::CodebookConfig;
    /// use qvcomp::distortion::DistortionMetric;
    ///
    /// let config = CodebookConfig::builder()
    ///     .alphabet_size(4)
    ///     .comp(0.5)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.alphabet_size(), 4);
    /// assert_eq!(config.distortion(), DistortionMetric::Mse);
    /// ```
    #[must_use]
    pub fn builder() -> CodebookConfigBuilder {
        CodebookConfigBuilder::new()
    }

    /// Returns the number of distinct quality values.
    #[inline]
    #[must_use]
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// Returns the configured distortion measure.
    #[inline]
    #[must_use]
    pub fn distortion(&self) -> DistortionMetric {
        self.distortion
    }

    /// Returns the entropy budget multiplier.
    #[inline]
    #[must_use]
    pub fn comp(&self) -> f64 {
        self.comp
    }

    /// Returns the number of clusters for the training pre-pass.
    #[inline]
    #[must_use]
    pub fn clusters(&self) -> usize {
        self.clusters
    }

    /// Returns the centroid movement threshold for the clustering pre-pass.
    #[inline]
    #[must_use]
    pub fn cluster_threshold(&self) -> f64 {
        self.cluster_threshold
    }

    /// Returns the symbol alphabet implied by the configuration.
    #[must_use]
    pub fn alphabet(&self) -> Alphabet {
        Alphabet::trivial(self.alphabet_size)
    }

    /// Builds the distortion table implied by the configuration.
    #[must_use]
    pub fn distortion_table(&self) -> DistortionTable {
        DistortionTable::new(self.distortion, self.alphabet_size)
    }
}

impl Default for CodebookConfig {
    fn default() -> Self {
        CodebookConfigBuilder::new()
            .build()
            .expect("default configuration must be valid")
    }
}

/// A builder for [`CodebookConfig`].
#[derive(Debug, Clone)]
pub struct CodebookConfigBuilder {
    alphabet_size: usize,
    distortion: DistortionMetric,
    comp: f64,
    clusters: usize,
    cluster_threshold: f64,
}

impl CodebookConfigBuilder {
    /// Returns a new `CodebookConfigBuilder` instance with the default
    /// settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alphabet_size: DEFAULT_ALPHABET_SIZE,
            distortion: DistortionMetric::Mse,
            comp: 0.5,
            clusters: 1,
            cluster_threshold: DEFAULT_MOVEMENT_THRESHOLD,
        }
    }

    /// Sets the number of distinct quality values.
    pub fn alphabet_size(&mut self, alphabet_size: usize) -> &mut Self {
        self.alphabet_size = alphabet_size;
        self
    }

    /// Sets the distortion measure to optimize for.
    pub fn distortion(&mut self, distortion: DistortionMetric) -> &mut Self {
        self.distortion = distortion;
        self
    }

    /// Sets the entropy budget multiplier (bits of rate per bit of source
    /// entropy per symbol).
    pub fn comp(&mut self, comp: f64) -> &mut Self {
        self.comp = comp;
        self
    }

    /// Sets the number of clusters for the training pre-pass.
    pub fn clusters(&mut self, clusters: usize) -> &mut Self {
        self.clusters = clusters;
        self
    }

    /// Sets the centroid movement threshold for the clustering pre-pass.
    pub fn cluster_threshold(&mut self, cluster_threshold: f64) -> &mut Self {
        self.cluster_threshold = cluster_threshold;
        self
    }

    /// Validates the settings and builds a [`CodebookConfig`].
    ///
    /// # Errors
    /// Returns [`CodebookError::ConfigurationInvalid`] for an alphabet size
    /// outside `1..=64`, a negative or non-finite `comp`, or a zero cluster
    /// count.
    pub fn build(&self) -> CodebookResult<CodebookConfig> {
        if self.alphabet_size < 1 || self.alphabet_size > MAX_ALPHABET_SIZE {
            return Err(CodebookError::ConfigurationInvalid(format!(
                "alphabet size must be in 1..={}, got {}",
                MAX_ALPHABET_SIZE, self.alphabet_size
            )));
        }
        if !self.comp.is_finite() || self.comp < 0.0 {
            return Err(CodebookError::ConfigurationInvalid(format!(
                "comp must be a non-negative finite number, got {}",
                self.comp
            )));
        }
        if self.clusters < 1 {
            return Err(CodebookError::ConfigurationInvalid(
                "cluster count must be at least 1".to_owned(),
            ));
        }
        if !self.cluster_threshold.is_finite() || self.cluster_threshold < 0.0 {
            return Err(CodebookError::ConfigurationInvalid(format!(
                "cluster threshold must be a non-negative finite number, got {}",
                self.cluster_threshold
            )));
        }

        Ok(CodebookConfig {
            alphabet_size: self.alphabet_size,
            distortion: self.distortion,
            comp: self.comp,
            clusters: self.clusters,
            cluster_threshold: self.cluster_threshold,
        })
    }
}

impl Default for CodebookConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
