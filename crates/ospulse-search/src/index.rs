use chrono::NaiveDate;

/// One pruned data series: a name prefix plus the strftime format of the
/// date embedded in index names of that series.
///
/// The format must match the naming convention exactly or pruning will
/// silently match nothing for that series.
#[derive(Debug, Clone, Copy)]
pub struct IndexSeries {
    pub prefix: &'static str,
    pub time_format: &'static str,
}

/// The fixed table of series subject to age-based retention.
pub const PRUNED_SERIES: &[IndexSeries] = &[
    IndexSeries { prefix: "events_", time_format: "%Y-%m-%d" },
    IndexSeries { prefix: "logstash-", time_format: "%Y.%m.%d" },
    IndexSeries { prefix: "goldstone-", time_format: "%Y.%m.%d" },
    IndexSeries { prefix: "goldstone_metrics-", time_format: "%Y.%m.%d" },
    IndexSeries { prefix: "api_stats-", time_format: "%Y.%m.%d" },
    IndexSeries { prefix: "internal-", time_format: "%Y.%m.%d" },
];

/// Name of the daily index for `date` in a dot-dated series, e.g.
/// `api_stats-2020.06.15`. All series written by this system use the
/// dotted format; only externally-written series differ.
pub fn daily_index(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}{}", date.format("%Y.%m.%d"))
}

impl IndexSeries {
    /// Parse the date embedded in `name`, if `name` belongs to this series.
    pub fn parse_date(&self, name: &str) -> Option<NaiveDate> {
        let rest = name.strip_prefix(self.prefix)?;
        NaiveDate::parse_from_str(rest, self.time_format).ok()
    }
}

/// Indices of `series` in `names` whose embedded date is strictly older
/// than `cutoff`. Purely a function of its inputs; names that do not carry
/// a parseable date are skipped.
pub fn select_expired(names: &[String], series: &IndexSeries, cutoff: NaiveDate) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            series
                .parse_date(name)
                .is_some_and(|date| date < cutoff)
        })
        .cloned()
        .collect()
}
