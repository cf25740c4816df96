//! Descriptive analysis of the sources and of the disease assignments.
//!
//! Everything here is peripheral to the fusion chain: chart failures are
//! logged and skipped.

use std::collections::BTreeSet;

use log::{info, warn};
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;

use crate::charts::{BarChart, BarSeries, BoxChart, StaticChartRenderer};
use crate::data::schema::{
    string_values, AGE_BIN, ASSIGNED_DISEASE, BMI, DEVICE, IMPUTED_AGE_BIN, RACE, SEX,
};
use crate::data::StratifiedViews;
use crate::stats::{CrossTab, StatsCalculator};

/// Long topic name shortened in result tables and charts.
pub const NPW_TOPIC: &str = "Nutrition, Physical Activity, and Weight Status";
pub const NPW_ABBREVIATION: &str = "NPW";

/// A chart paired with the file name it is written to.
pub enum NamedChart {
    Bar(&'static str, BarChart),
    Box(&'static str, BoxChart),
}

impl NamedChart {
    fn file_name(&self) -> &'static str {
        match self {
            NamedChart::Bar(name, _) | NamedChart::Box(name, _) => name,
        }
    }
}

/// Disease assignment counts overall and by demographic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiseaseSummary {
    pub counts: Vec<(String, usize)>,
    pub by_sex: CrossTab,
    pub by_age: CrossTab,
}

impl DiseaseSummary {
    pub fn total_assigned(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

fn sorted_unique(values: &[Option<String>]) -> Vec<String> {
    values
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Wearable subjects per age bin, one bar per device stacked by sex.
pub fn wearable_device_chart(wearable: &DataFrame) -> PolarsResult<BarChart> {
    let age_bins = string_values(wearable, IMPUTED_AGE_BIN)?;
    let devices = string_values(wearable, DEVICE)?;
    let sexes = string_values(wearable, SEX)?;

    let categories = sorted_unique(&age_bins);
    let device_levels = sorted_unique(&devices);
    let sex_levels = sorted_unique(&sexes);

    let mut series = Vec::new();
    for (slot, device) in device_levels.iter().enumerate() {
        for sex in &sex_levels {
            let values = categories
                .iter()
                .map(|bin| {
                    age_bins
                        .iter()
                        .zip(&devices)
                        .zip(&sexes)
                        .filter(|((a, d), s)| {
                            a.as_deref() == Some(bin.as_str())
                                && d.as_deref() == Some(device.as_str())
                                && s.as_deref() == Some(sex.as_str())
                        })
                        .count() as f64
                })
                .collect();
            series.push(BarSeries {
                name: format!("{device}, {sex}"),
                slot,
                values,
            });
        }
    }

    Ok(BarChart {
        title: "Device Count by Age Bin and Device, Stacked by Sex".to_string(),
        x_label: "Age Bin".to_string(),
        y_label: "Count".to_string(),
        legend_title: Some("Device/Sex".to_string()),
        categories,
        series,
    })
}

/// The two stratified survey sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveySource {
    Nutrition,
    Chronic,
}

impl SurveySource {
    /// Prefix used in chart titles.
    pub fn label(self) -> &'static str {
        match self {
            SurveySource::Nutrition => "Nutri",
            SurveySource::Chronic => "Chronic",
        }
    }

    /// Sex, age and race chart file names.
    pub fn chart_files(self) -> [&'static str; 3] {
        match self {
            SurveySource::Nutrition => [
                "nutri_sex_analysis.png",
                "nutri_age_analysis.png",
                "nutri_race_analysis.png",
            ],
            SurveySource::Chronic => [
                "chronic_sex_analysis.png",
                "chronic_age_analysis.png",
                "chronic_race_analysis.png",
            ],
        }
    }
}

/// Count charts for the sex, age and race views of one survey source.
pub fn survey_charts(source: SurveySource, views: &StratifiedViews) -> PolarsResult<Vec<NamedChart>> {
    let sex = StatsCalculator::value_counts(&views.sex, SEX)?;
    let age = StatsCalculator::value_counts_by_label(&views.age, AGE_BIN)?;
    let race = StatsCalculator::value_counts(&views.race, RACE)?;

    let label = source.label();
    let [sex_file, age_file, race_file] = source.chart_files();

    Ok(vec![
        NamedChart::Bar(sex_file, BarChart::single(&format!("{label} Data: Sex Counts"), "Sex", &sex)),
        NamedChart::Bar(age_file, BarChart::single(&format!("{label} Data: Age Bin Counts"), "Age Bin", &age)),
        NamedChart::Bar(
            race_file,
            BarChart::single(&format!("{label} Data: Race/Ethnicity Counts"), "Race/Ethnicity", &race),
        ),
    ])
}

/// Abbreviate the long nutrition topic in `Assigned_Disease`.
pub fn abbreviate_topics(final_results: &DataFrame) -> PolarsResult<DataFrame> {
    final_results
        .clone()
        .lazy()
        .with_column(
            when(col(ASSIGNED_DISEASE).eq(lit(NPW_TOPIC)))
                .then(lit(NPW_ABBREVIATION))
                .otherwise(col(ASSIGNED_DISEASE))
                .alias(ASSIGNED_DISEASE),
        )
        .collect()
}

/// Count assigned diseases overall, by sex and by age bin. Unassigned subjects are excluded.
pub fn summarize_diseases(final_results: &DataFrame) -> PolarsResult<DiseaseSummary> {
    let df = abbreviate_topics(final_results)?;
    let summary = DiseaseSummary {
        counts: StatsCalculator::value_counts(&df, ASSIGNED_DISEASE)?,
        by_sex: StatsCalculator::crosstab(&df, ASSIGNED_DISEASE, SEX)?,
        by_age: StatsCalculator::crosstab(&df, ASSIGNED_DISEASE, IMPUTED_AGE_BIN)?,
    };
    info!(
        "{} subjects assigned across {} diseases",
        summary.total_assigned(),
        summary.counts.len()
    );
    Ok(summary)
}

pub fn disease_charts(summary: &DiseaseSummary) -> Vec<NamedChart> {
    vec![
        NamedChart::Bar(
            "disease_counts.png",
            BarChart::single("Disease Counts", "Disease", &summary.counts),
        ),
        NamedChart::Bar(
            "disease_by_sex.png",
            BarChart::grouped("Disease Distribution by Sex", "Disease", "Sex", &summary.by_sex),
        ),
        NamedChart::Bar(
            "disease_by_age.png",
            BarChart::grouped("Disease Distribution by Age Bin", "Disease", "Age Bin", &summary.by_age),
        ),
    ]
}

/// BMI distribution by sex, split by age bin.
pub fn bmi_chart(final_results: &DataFrame) -> PolarsResult<BoxChart> {
    let grouped = StatsCalculator::grouped_values(final_results, SEX, IMPUTED_AGE_BIN, BMI)?;
    let groups: BTreeSet<String> = grouped.keys().map(|(g, _)| g.clone()).collect();
    let hues: BTreeSet<String> = grouped.keys().map(|(_, h)| h.clone()).collect();

    Ok(BoxChart {
        title: "BMI Distribution by Sex and Age Bin".to_string(),
        x_label: "Sex".to_string(),
        y_label: "BMI".to_string(),
        groups: groups.into_iter().collect(),
        hues: hues.into_iter().collect(),
        stats: StatsCalculator::compute_grouped_box_stats_parallel(&grouped),
    })
}

/// Write every chart into `dir`, logging failures. Returns how many were written.
pub fn render_charts(charts: &[NamedChart], dir: &Path) -> usize {
    let mut written = 0;
    for chart in charts {
        let path = dir.join(chart.file_name());
        let result = match chart {
            NamedChart::Bar(_, bar) => StaticChartRenderer::render_bar_chart(bar, &path),
            NamedChart::Box(_, boxes) => StaticChartRenderer::render_box_chart(boxes, &path),
        };
        match result {
            Ok(()) => {
                info!("Saved {}", path.display());
                written += 1;
            }
            Err(e) => warn!("Unable to create {}: {e}", path.display()),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_results() -> DataFrame {
        df!(
            "Device" => &["Fitbit", "Fitbit", "Apple Watch", "Apple Watch"],
            "Sex" => &["Female", "Male", "Female", "Female"],
            "Age_Bin" => &["18-44", "18-44", "45-64", "18-44"],
            "BMI" => &[22.0, 31.0, 27.5, 24.0],
            "Assigned_Disease" => &[Some(NPW_TOPIC), Some("Diabetes"), None, Some(NPW_TOPIC)],
        )
        .unwrap()
    }

    #[test]
    fn summary_abbreviates_and_skips_unassigned() {
        let summary = summarize_diseases(&final_results()).unwrap();

        assert_eq!(
            summary.counts,
            vec![("NPW".to_string(), 2), ("Diabetes".to_string(), 1)]
        );
        assert_eq!(summary.total_assigned(), 3);
        assert_eq!(summary.by_sex.get("NPW", "Female"), 2);
        assert_eq!(summary.by_sex.get("Diabetes", "Male"), 1);
        assert_eq!(summary.by_age.columns, vec!["18-44".to_string()]);
    }

    #[test]
    fn device_chart_stacks_sexes_per_device() {
        let chart = wearable_device_chart(&final_results()).unwrap();

        assert_eq!(chart.categories, vec!["18-44".to_string(), "45-64".to_string()]);
        assert_eq!(chart.n_slots(), 2);
        let fitbit_female = chart
            .series
            .iter()
            .find(|s| s.name == "Fitbit, Female")
            .unwrap();
        assert_eq!(fitbit_female.values, vec![1.0, 0.0]);
        assert_eq!(chart.max_height(), 2.0);
    }

    #[test]
    fn bmi_chart_groups_by_sex_and_age_bin() {
        let chart = bmi_chart(&final_results()).unwrap();

        assert_eq!(chart.groups, vec!["Female".to_string(), "Male".to_string()]);
        assert_eq!(chart.hues, vec!["18-44".to_string(), "45-64".to_string()]);
        assert_eq!(chart.stats[&("Female".to_string(), "18-44".to_string())].count, 2);
        assert_eq!(chart.value_range(), Some((22.0, 31.0)));
    }

    #[test]
    fn survey_age_chart_is_sorted_by_bin() {
        let views = StratifiedViews {
            sex: df!("Sex" => &["Male", "Female", "Female"]).unwrap(),
            age: df!("age_bin" => &["65+", "18-44", "45-64", "18-44"]).unwrap(),
            race: df!("Race/Ethnicity" => &["Hispanic"]).unwrap(),
        };

        let charts = survey_charts(SurveySource::Nutrition, &views).unwrap();
        let NamedChart::Bar(file, age) = &charts[1] else {
            panic!("expected a bar chart");
        };

        assert_eq!(*file, "nutri_age_analysis.png");
        assert_eq!(age.categories, vec!["18-44", "45-64", "65+"]);
        assert_eq!(age.series[0].values, vec![2.0, 1.0, 1.0]);
    }

    #[test]
    fn chronic_charts_use_chronic_file_names() {
        let views = StratifiedViews {
            sex: df!("Sex" => &["Male"]).unwrap(),
            age: df!("age_bin" => &["65+"]).unwrap(),
            race: df!("Race/Ethnicity" => &["Hispanic"]).unwrap(),
        };

        let charts = survey_charts(SurveySource::Chronic, &views).unwrap();
        let files: Vec<&str> = charts.iter().map(NamedChart::file_name).collect();

        assert_eq!(files, SurveySource::Chronic.chart_files());
        let NamedChart::Bar(_, race) = &charts[2] else {
            panic!("expected a bar chart");
        };
        assert_eq!(race.title, "Chronic Data: Race/Ethnicity Counts");
    }
}
