use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dojo_types::{AttendanceRequest, AttendanceSummary, Order, OrderStatus};

use super::attendance::target_student;
use super::goals::{load_goal, progress};
use super::{parse_id, ApiError, ApiResult};
use crate::db::repositories::{AttendanceFilter, AttendanceRepository, OrderRepository};
use crate::export::{self, ExportFormat, Report};
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::stats;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub student_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// `xlsx` or `pdf`; JSON when absent
    pub export: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceReport {
    pub requests: Vec<AttendanceRequest>,
    pub summary: AttendanceSummary,
}

fn export_format(raw: Option<&str>) -> ApiResult<Option<ExportFormat>> {
    match raw {
        None => Ok(None),
        Some(raw) => ExportFormat::parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Unsupported export format '{}'", raw))),
    }
}

/// Render `report` as a downloadable file
fn download(report: &Report, format: ExportFormat, file_stem: &str) -> ApiResult<Response> {
    let bytes = export::render(report, format)?;
    let disposition = format!(
        "attachment; filename=\"{}_{}.{}\"",
        file_stem,
        Utc::now().format("%Y%m%d"),
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /reports/attendance - Requests plus the weekday summary
///
/// Staff may filter by any student or class; students always get their own.
pub async fn attendance_report(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let user = ctx.require_user()?;
    let format = export_format(query.export.as_deref())?;

    let student_id = if user.is_staff() {
        query.student_id
    } else {
        Some(target_student(user, query.student_id)?)
    };
    let requests = AttendanceRepository::new(state.db.pool.clone()).list(&AttendanceFilter {
        student_id,
        class_id: query.class_id,
        from: query.from,
        to: query.to,
        ..Default::default()
    })?;
    let summary = stats::attendance_summary(&requests, query.from, query.to);

    match format {
        Some(format) => {
            let report = Report {
                title: "Attendance report".to_string(),
                tables: vec![export::summary_table(&summary), export::attendance_table(&requests)],
            };
            download(&report, format, "attendance")
        }
        None => Ok(Json(AttendanceReport { requests, summary }).into_response()),
    }
}

/// GET /reports/orders - Orders by status and period (staff)
pub async fn orders_report(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    ctx.require_staff()?;
    let format = export_format(query.export.as_deref())?;

    let from = query
        .from
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    let to = query
        .to
        .and_then(|d| d.succ_opt())
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    let orders: Vec<Order> = OrderRepository::new(state.db.pool.clone())
        .list(query.student_id.as_ref(), query.status, from, to)?
        .into_iter()
        .filter(|o| to.map_or(true, |t| o.requested_at < t))
        .collect();

    match format {
        Some(format) => {
            let report = Report {
                title: "Orders report".to_string(),
                tables: vec![export::orders_table(&orders)],
            };
            download(&report, format, "orders")
        }
        None => Ok(Json(orders).into_response()),
    }
}

/// GET /reports/goals/:id - Goal progress of every active student (staff)
pub async fn goal_report(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    ctx.require_staff()?;
    let format = export_format(query.export.as_deref())?;
    let goal_id = parse_id(&goal_id, "goal")?;

    let report = progress(&state.db, load_goal(&state.db, &goal_id)?)?;

    match format {
        Some(format) => {
            let rendered = Report {
                title: format!("Goal: {}", report.goal.title),
                tables: vec![export::goal_table(&report)],
            };
            download(&rendered, format, "goal")
        }
        None => Ok(Json(report).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_parsing() {
        assert_eq!(export_format(None).unwrap(), None);
        assert_eq!(export_format(Some("pdf")).unwrap(), Some(ExportFormat::Pdf));
        assert_eq!(export_format(Some("XLSX")).unwrap(), Some(ExportFormat::Xlsx));
        assert!(matches!(export_format(Some("csv")), Err(ApiError::BadRequest(_))));
    }
}
