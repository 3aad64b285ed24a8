//! Instances and the user-facing dataset.
//!
//! A [`Sample`] is what callers hand to training and evaluation: raw string
//! values plus a label. An [`Instance`] is the resolved form the model keeps
//! internally: dense value ids per feature, a dense target index, a sample
//! weight and an occurrence count.

/// Schema violations detected while ingesting data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// A sample's value count does not match the feature count.
    #[error("instance has {got} values, expected {expected}")]
    ArityMismatch { expected: usize, got: usize },

    /// A numeric feature received a token that does not parse as a number.
    #[error("feature {feature} is numeric but value {value:?} is not a number")]
    NotNumeric { feature: usize, value: String },
}

/// One raw labeled example.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Feature values, one token per feature.
    pub values: Vec<String>,
    /// Class label.
    pub label: String,
    /// Relative exemplar weight.
    pub weight: f64,
    /// How many times this example occurred.
    pub occurrences: u32,
}

impl Sample {
    /// A sample with unit weight and a single occurrence.
    pub fn new<V, S>(values: V, label: impl Into<String>) -> Self
    where
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            label: label.into(),
            weight: 1.0,
            occurrences: 1,
        }
    }

    /// Set the exemplar weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the occurrence count.
    pub fn with_occurrences(mut self, occurrences: u32) -> Self {
        self.occurrences = occurrences;
        self
    }
}

/// A collection of samples with a consistent arity.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
    n_features: Option<usize>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, validating its arity against the first one.
    pub fn push(&mut self, sample: Sample) -> Result<(), SchemaError> {
        let expected = *self.n_features.get_or_insert(sample.values.len());
        if sample.values.len() != expected {
            return Err(SchemaError::ArityMismatch {
                expected,
                got: sample.values.len(),
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    /// Build a dataset from `(values, label)` pairs.
    pub fn from_rows<V, S>(rows: impl IntoIterator<Item = (V, S)>) -> Result<Self, SchemaError>
    where
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ds = Self::new();
        for (values, label) in rows {
            ds.push(Sample::new(values, label))?;
        }
        Ok(ds)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of features (None until the first sample arrives).
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// The samples, in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// True when any sample carries a non-unit weight.
    pub fn has_weights(&self) -> bool {
        self.samples.iter().any(|s| s.weight != 1.0)
    }
}

/// One resolved training instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Dense value id per feature (0 = unknown sentinel).
    pub values: Vec<u32>,
    /// Dense target index.
    pub target: u32,
    /// Relative exemplar weight.
    pub sample_weight: f64,
    /// Occurrence count (at least 1).
    pub occurrences: u32,
}

impl Instance {
    /// An instance of `size` unknown values bound to target 0.
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0; size],
            target: 0,
            sample_weight: 1.0,
            occurrences: 1,
        }
    }

    /// Number of feature positions.
    pub fn size(&self) -> usize {
        self.values.len()
    }
}
