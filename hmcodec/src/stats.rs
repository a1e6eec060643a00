use std::collections::BTreeMap;

use serde::Serialize;

/// Shannon entropy in bits per symbol of a frequency table.
pub fn entropy<S>(freqs: &BTreeMap<S, u64>) -> f64 {
    let total: u64 = freqs.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    freqs
        .values()
        .filter(|&&n| n > 0)
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Size and entropy figures for one coded stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamStats {
    pub symbols: u64,
    pub distinct: usize,
    pub coded_bits: u64,
    pub entropy: f64,
}

impl StreamStats {
    pub fn new<S>(freqs: &BTreeMap<S, u64>, coded_bits: u64) -> Self {
        Self {
            symbols: freqs.values().sum(),
            distinct: freqs.len(),
            coded_bits,
            entropy: entropy(freqs),
        }
    }

    pub fn bits_per_symbol(&self) -> f64 {
        if self.symbols == 0 {
            0.0
        } else {
            self.coded_bits as f64 / self.symbols as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(counts: &[(u8, u64)]) -> BTreeMap<u8, u64> {
        counts.iter().copied().collect()
    }

    #[test]
    fn uniform_distribution() {
        let freqs = table(&[(0, 10), (1, 10), (2, 10), (3, 10)]);
        assert!((entropy(&freqs) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn single_symbol_has_zero_entropy() {
        assert_eq!(entropy(&table(&[(9, 1000)])), 0.0);
        assert_eq!(entropy(&BTreeMap::<u8, u64>::new()), 0.0);
    }

    #[test]
    fn skewed_distribution() {
        let freqs = table(&[(0, 1), (1, 1), (2, 2)]);
        assert!((entropy(&freqs) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn stats_report_bits_per_symbol() {
        let stats = StreamStats::new(&table(&[(0, 3), (1, 1)]), 4);
        assert_eq!(stats.symbols, 4);
        assert_eq!(stats.distinct, 2);
        assert!((stats.bits_per_symbol() - 1.0).abs() < f64::EPSILON);
        assert!(stats.entropy < stats.bits_per_symbol());
    }
}
