use crate::error::SortedArrayError;

use ndarray::{Array1, ArrayView1};
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

// Underlying array is guaranteed to be sorted and contiguous
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SortedArray(pub Array1<f64>);

impl SortedArray {
    pub fn from_sorted(sorted_array: impl Into<Array1<f64>>) -> Result<Self, SortedArrayError> {
        let sorted_array = sorted_array.into();
        if sorted_array
            .as_slice()
            .ok_or(SortedArrayError::NonContiguous)?
            .is_sorted()
        {
            Ok(Self(sorted_array))
        } else {
            Err(SortedArrayError::Unsorted)
        }
    }

    pub fn maximum(&self) -> f64 {
        self[self.len() - 1]
    }

    pub fn minimum(&self) -> f64 {
        self[0]
    }

    pub fn median(&self) -> f64 {
        assert_ne!(self.len(), 0);
        let i = (self.len() - 1) / 2;
        if self.len() % 2 == 0 {
            0.5 * (self[i] + self[i + 1])
        } else {
            self[i]
        }
    }

    // R-5 from https://en.wikipedia.org/wiki/Quantile
    pub fn ppf(&self, q: f64) -> f64 {
        assert_ne!(self.len(), 0);
        assert!(
            (0.0..=1.0).contains(&q),
            "quantile should be between zero and unity"
        );
        let h = (self.len() as f64) * q - 0.5;
        let h_floor = h.floor();
        if h_floor < 0.0 {
            self.minimum()
        } else {
            #[allow(clippy::cast_sign_loss)]
            let i = h_floor as usize;
            if i >= self.len() - 1 {
                self.maximum()
            } else {
                self[i] + (h - h_floor) * (self[i + 1] - self[i])
            }
        }
    }
}

impl From<Vec<f64>> for SortedArray {
    fn from(mut v: Vec<f64>) -> Self {
        v.sort_unstable_by(f64::total_cmp);
        Self(Array1::from_vec(v))
    }
}

impl From<&[f64]> for SortedArray {
    fn from(s: &[f64]) -> Self {
        s.to_vec().into()
    }
}

impl From<ArrayView1<'_, f64>> for SortedArray {
    fn from(v: ArrayView1<'_, f64>) -> Self {
        v.to_vec().into()
    }
}

impl Deref for SortedArray {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        self.0
            .as_slice()
            .expect("SortedArray is always contiguous")
    }
}

impl AsRef<[f64]> for SortedArray {
    fn as_ref(&self) -> &[f64] {
        self
    }
}

impl JsonSchema for SortedArray {
    fn is_referenceable() -> bool {
        false
    }

    fn schema_name() -> String {
        "SortedArray".to_owned()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <Vec<f64> as JsonSchema>::json_schema(generator)
    }
}
