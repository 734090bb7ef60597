//! `<table>.<op>` methods for every entity, routed to one generic handler.

use crate::entities::{
    Attendance, Class, Course, Department, Enrollment, Entity, Exam, Grade, Registration, Student,
    Teacher, Timetable,
};
use crate::error::{StoreError, StoreResult};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::manager::{EntityLifecycleManager, ListFilter, Patch};
use crate::schema::EntityKind;
use serde_json::json;
use tracing::info;

const OPS: [&str; 6] = ["list", "get", "create", "update", "delete", "search"];

fn get_required_id(params: &serde_json::Value, key: &str) -> StoreResult<i64> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| StoreError::invalid(key, format!("missing {}", key)))
}

fn get_fields(params: &serde_json::Value) -> StoreResult<Patch> {
    params
        .get("fields")
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| StoreError::invalid("fields", "missing fields object"))
}

fn get_filter(params: &serde_json::Value) -> StoreResult<Option<ListFilter>> {
    let Some(raw) = params.get("filter") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(obj) = raw.as_object() else {
        return Err(StoreError::invalid("filter", "filter must be an object"));
    };
    if obj.len() != 1 {
        return Err(StoreError::invalid(
            "filter",
            "filter must name exactly one field",
        ));
    }
    let Some((field, value)) = obj.iter().next() else {
        return Ok(None);
    };
    let id = value
        .as_i64()
        .ok_or_else(|| StoreError::invalid("filter", format!("{} must be an integer id", field)))?;
    Ok(Some(ListFilter::new(field.clone(), id)))
}

fn dispatch<E: Entity>(
    manager: &EntityLifecycleManager<'_>,
    op: &str,
    params: &serde_json::Value,
) -> StoreResult<serde_json::Value> {
    match op {
        "list" => {
            let filter = get_filter(params)?;
            let rows = manager.list::<E>(filter.as_ref())?;
            Ok(json!({ "entity": E::KIND, "rows": rows }))
        }
        "search" => {
            let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let rows = manager.search::<E>(query)?;
            Ok(json!({ "entity": E::KIND, "rows": rows }))
        }
        "get" => {
            let id = get_required_id(params, "id")?;
            Ok(json!({ "record": manager.get::<E>(id)? }))
        }
        "create" => {
            let fields = get_fields(params)?;
            let draft: E::Draft = serde_json::from_value(serde_json::Value::Object(fields))
                .map_err(|e| StoreError::invalid("fields", e.to_string()))?;
            Ok(json!({ "record": manager.create::<E>(draft)? }))
        }
        "update" => {
            let id = get_required_id(params, "id")?;
            let fields = get_fields(params)?;
            Ok(json!({ "record": manager.update::<E>(id, &fields)? }))
        }
        "delete" => {
            let id = get_required_id(params, "id")?;
            let report = manager.delete::<E>(id)?;
            info!(
                entity = %E::KIND,
                id,
                rows = report.total(),
                "deleted"
            );
            Ok(json!({ "deleted": report }))
        }
        _ => Err(StoreError::invalid("method", format!("unknown operation {}", op))),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (prefix, op) = req.method.split_once('.')?;
    let kind = EntityKind::from_table(prefix)?;
    if !OPS.contains(&op) {
        return None;
    }

    let Some(manager) = state.manager() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    let params = &req.params;
    let result = match kind {
        EntityKind::Department => dispatch::<Department>(&manager, op, params),
        EntityKind::Course => dispatch::<Course>(&manager, op, params),
        EntityKind::Teacher => dispatch::<Teacher>(&manager, op, params),
        EntityKind::Student => dispatch::<Student>(&manager, op, params),
        EntityKind::Timetable => dispatch::<Timetable>(&manager, op, params),
        EntityKind::Exam => dispatch::<Exam>(&manager, op, params),
        EntityKind::Grade => dispatch::<Grade>(&manager, op, params),
        EntityKind::Registration => dispatch::<Registration>(&manager, op, params),
        EntityKind::Class => dispatch::<Class>(&manager, op, params),
        EntityKind::Enrollment => dispatch::<Enrollment>(&manager, op, params),
        EntityKind::Attendance => dispatch::<Attendance>(&manager, op, params),
    };

    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => store_err(&req.id, &req.method, &e),
    })
}
