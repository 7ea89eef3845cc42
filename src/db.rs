use anyhow::Context;
use chrono::{DateTime, Utc};
use dropout_risk::{
    AssessmentRecord, ModelRepository, RiskError, RiskLevel, RiskPredictor, StudentObservation,
};
use sqlx::{PgPool, Row};
use tracing::warn;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_assessment(pool: &PgPool, record: &AssessmentRecord) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dropout_risk.assessments
        (id, name, attendance, gpa, participation, stress, family_income,
         risk_level, risk_score, recommendations, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(record.observation.attendance)
    .bind(record.observation.gpa)
    .bind(record.observation.participation)
    .bind(record.observation.stress)
    .bind(record.observation.family_income)
    .bind(record.risk_level.as_str())
    .bind(i16::from(record.risk_score))
    .bind(&record.recommendations)
    .bind(record.recorded_at)
    .execute(pool)
    .await
    .context("failed to record assessment")?;
    Ok(())
}

/// Most recent first, optionally limited to records at or after `since`.
pub async fn fetch_assessments(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> anyhow::Result<Vec<AssessmentRecord>> {
    let mut query = String::from(
        "SELECT id, name, attendance, gpa, participation, stress, family_income, \
         risk_level, risk_score, recommendations, recorded_at \
         FROM dropout_risk.assessments",
    );

    if since.is_some() {
        query.push_str(" WHERE recorded_at >= $1 ORDER BY recorded_at DESC LIMIT $2");
    } else {
        query.push_str(" ORDER BY recorded_at DESC LIMIT $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = since {
        rows = rows.bind(value);
    }
    let rows = rows.bind(limit.max(0)).fetch_all(pool).await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let level: String = row.get("risk_level");
        let score: i16 = row.get("risk_score");
        records.push(AssessmentRecord {
            id: row.get("id"),
            name: row.get("name"),
            observation: StudentObservation {
                attendance: row.get("attendance"),
                gpa: row.get("gpa"),
                participation: row.get("participation"),
                stress: row.get("stress"),
                family_income: row.get("family_income"),
            },
            risk_level: RiskLevel::parse(&level)
                .with_context(|| format!("unknown risk level {level:?} in record log"))?,
            risk_score: u8::try_from(score)
                .with_context(|| format!("risk score {score} out of range in record log"))?,
            recommendations: row.get("recommendations"),
            recorded_at: row.get("recorded_at"),
        });
    }

    Ok(records)
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Score each CSV row and record it. Rows failing range checks are skipped.
pub async fn import_csv<R: ModelRepository>(
    pool: &PgPool,
    predictor: &RiskPredictor<R>,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        attendance: f64,
        gpa: f64,
        participation: f64,
        stress: f64,
        family_income: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let observation = StudentObservation {
            attendance: row.attendance,
            gpa: row.gpa,
            participation: row.participation,
            stress: row.stress,
            family_income: row.family_income,
        };

        let outcome = match predictor.assess(&row.name, observation) {
            Ok(outcome) => outcome,
            Err(err @ RiskError::Validation { .. }) => {
                warn!(row = line + 1, name = %row.name, %err, "skipping invalid row");
                summary.skipped += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        insert_assessment(pool, &outcome.to_record()).await?;
        summary.inserted += 1;
    }

    Ok(summary)
}
