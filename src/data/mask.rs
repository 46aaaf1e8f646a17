use std::ops::Index;

/// Boolean selection over a series, `true` means the point is used
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask(Vec<bool>);

impl Mask {
    /// Mask selecting all `n` points
    pub fn all(n: usize) -> Self {
        Self(vec![true; n])
    }

    pub fn from_vec(v: Vec<bool>) -> Self {
        Self(v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of selected points
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&x| x).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Indices of selected points
    pub fn indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| x.then_some(i))
            .collect()
    }

    /// Indices of rejected points
    pub fn rejected(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| (!x).then_some(i))
            .collect()
    }

    /// Logical and, in place
    pub fn and_assign(&mut self, other: &Mask) {
        assert_eq!(self.len(), other.len(), "masks should have the same size");
        for (a, &b) in self.0.iter_mut().zip(other.0.iter()) {
            *a &= b;
        }
    }

    /// Select values of `a` under the mask
    pub fn select(&self, a: &[f64]) -> Vec<f64> {
        assert_eq!(self.len(), a.len(), "mask and array should have the same size");
        a.iter()
            .zip(self.0.iter())
            .filter_map(|(&x, &m)| m.then_some(x))
            .collect()
    }
}

impl Index<usize> for Mask {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        &self.0[index]
    }
}

impl FromIterator<bool> for Mask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_and_combine() {
        let mut a = Mask::from_vec(vec![true, false, true, true]);
        let b: Mask = [true, true, false, true].into_iter().collect();
        a.and_assign(&b);
        assert_eq!(a.count(), 2);
        assert_eq!(a.indices(), vec![0, 3]);
        assert_eq!(a.rejected(), vec![1, 2]);
        assert_eq!(a.select(&[1.0, 2.0, 3.0, 4.0]), vec![1.0, 4.0]);
    }
}
