//! Static registry of the declared series.
//!
//! Every name a data file may bind maps to one `SeriesSlot`. Lookups are a
//! plain match, so adding a series means adding a variant here and a field on
//! `Model`.

use std::fmt;

/// Period label record name.
pub const PERIOD_LABEL: &str = "LATA";
/// Period count binding exported to scripts.
pub const PERIOD_COUNT: &str = "LL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// Fixed-length numeric array, one value per period.
    Array,
    /// Scalar count. Not bindable from data records yet.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesSlot {
    PeriodCount,
    PeriodLabels,
    GrowthKi,
    GrowthKs,
    GrowthInw,
    GrowthEks,
    GrowthImp,
    Ki,
    Ks,
    Inw,
    Eks,
    Imp,
    Aggregate,
}

impl SeriesSlot {
    pub const ALL: [SeriesSlot; 13] = [
        SeriesSlot::PeriodCount,
        SeriesSlot::PeriodLabels,
        SeriesSlot::GrowthKi,
        SeriesSlot::GrowthKs,
        SeriesSlot::GrowthInw,
        SeriesSlot::GrowthEks,
        SeriesSlot::GrowthImp,
        SeriesSlot::Ki,
        SeriesSlot::Ks,
        SeriesSlot::Inw,
        SeriesSlot::Eks,
        SeriesSlot::Imp,
        SeriesSlot::Aggregate,
    ];

    /// Growth factors, paired index-wise with `BASE`.
    pub const GROWTH: [SeriesSlot; 5] = [
        SeriesSlot::GrowthKi,
        SeriesSlot::GrowthKs,
        SeriesSlot::GrowthInw,
        SeriesSlot::GrowthEks,
        SeriesSlot::GrowthImp,
    ];

    /// Base stocks. The last entry is subtracted from the aggregate.
    pub const BASE: [SeriesSlot; 5] = [
        SeriesSlot::Ki,
        SeriesSlot::Ks,
        SeriesSlot::Inw,
        SeriesSlot::Eks,
        SeriesSlot::Imp,
    ];

    /// Row order used by the result formatter after the label row.
    pub const REPORT_ORDER: [SeriesSlot; 11] = [
        SeriesSlot::GrowthKi,
        SeriesSlot::GrowthKs,
        SeriesSlot::GrowthInw,
        SeriesSlot::GrowthEks,
        SeriesSlot::GrowthImp,
        SeriesSlot::Ki,
        SeriesSlot::Ks,
        SeriesSlot::Inw,
        SeriesSlot::Eks,
        SeriesSlot::Imp,
        SeriesSlot::Aggregate,
    ];

    /// Resolve a record's leading token. Case-sensitive.
    pub fn lookup(name: &str) -> Option<SeriesSlot> {
        let slot = match name {
            "LL" => SeriesSlot::PeriodCount,
            "LATA" => SeriesSlot::PeriodLabels,
            "twKI" => SeriesSlot::GrowthKi,
            "twKS" => SeriesSlot::GrowthKs,
            "twINW" => SeriesSlot::GrowthInw,
            "twEKS" => SeriesSlot::GrowthEks,
            "twIMP" => SeriesSlot::GrowthImp,
            "KI" => SeriesSlot::Ki,
            "KS" => SeriesSlot::Ks,
            "INW" => SeriesSlot::Inw,
            "EKS" => SeriesSlot::Eks,
            "IMP" => SeriesSlot::Imp,
            "PKB" => SeriesSlot::Aggregate,
            _ => return None,
        };
        Some(slot)
    }

    pub fn name(self) -> &'static str {
        match self {
            SeriesSlot::PeriodCount => PERIOD_COUNT,
            SeriesSlot::PeriodLabels => PERIOD_LABEL,
            SeriesSlot::GrowthKi => "twKI",
            SeriesSlot::GrowthKs => "twKS",
            SeriesSlot::GrowthInw => "twINW",
            SeriesSlot::GrowthEks => "twEKS",
            SeriesSlot::GrowthImp => "twIMP",
            SeriesSlot::Ki => "KI",
            SeriesSlot::Ks => "KS",
            SeriesSlot::Inw => "INW",
            SeriesSlot::Eks => "EKS",
            SeriesSlot::Imp => "IMP",
            SeriesSlot::Aggregate => "PKB",
        }
    }

    pub fn kind(self) -> SeriesKind {
        match self {
            SeriesSlot::PeriodCount => SeriesKind::Count,
            _ => SeriesKind::Array,
        }
    }
}

impl fmt::Display for SeriesSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_round_trips_every_slot() {
        for slot in SeriesSlot::ALL {
            assert_eq!(SeriesSlot::lookup(slot.name()), Some(slot));
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(SeriesSlot::lookup("ki"), None);
        assert_eq!(SeriesSlot::lookup("TWKI"), None);
        assert_eq!(SeriesSlot::lookup("GDP"), None);
    }

    #[test]
    fn test_only_period_count_is_scalar() {
        let counts: Vec<_> = SeriesSlot::ALL
            .iter()
            .filter(|s| s.kind() == SeriesKind::Count)
            .collect();
        assert_eq!(counts, vec![&SeriesSlot::PeriodCount]);
    }
}
