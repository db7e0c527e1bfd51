//! WebSocket handler — one editing session per connection.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Sync events from the open session → remote reloads, debounced saves
//!
//! The connection task owns its `Session` and `SyncEngine`; nothing about a
//! live surface is shared between connections. Peers converge through the
//! document store, whose subscription delivers every committed write back to
//! every open session, including the writer's own.
//!
//! Handler functions validate, mutate the session, and return an `Outcome`.
//! The dispatch layer turns outcomes into reply frames. Role-denied actions
//! are not errors: they reply `done` with `applied: false`.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `presentation:open` → mount sync, mark presence, reply with the deck
//! 3. Client frames → dispatch → handler returns Outcome
//! 4. Sync events → `presentation:changed` / `slide:loaded` /
//!    `presentation:missing` pushes
//! 5. Close → flush pending edits, unmount, clear presence

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use base64::Engine as _;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services::export::{self, ExportScope};
use crate::services::presentation::{self, PresentationError};
use crate::services::role::{Action, Role};
use crate::services::session::Session;
use crate::services::slides::{self, SlideTarget};
use crate::services::sync::{RemoteUpdate, SyncEngine, SyncEvent};
use crate::state::AppState;
use crate::surface::snapshot::CanvasObject;
use crate::surface::tools::{self, Shape, StyleChange};
use crate::surface::{Brush, Canvas, SurfaceError};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// build the frames sent back; handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
    /// The role gate refused the action. Done with `applied: false`.
    Ignored,
    /// Reply, then push the slide now on the surface.
    ReplyAndLoad(Data),
}

/// Live editing state owned by one connection.
struct Editing {
    session: Session,
    engine: SyncEngine,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    let welcome = Frame::request("session:connected", Data::new()).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    let mut editing: Option<Editing> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let frames = process_inbound_text(&state, &mut editing, client_id, &text).await;
                        if send_frames(&mut socket, &frames).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = next_sync_event(&mut editing) => {
                let frames = process_sync_event(&state, &mut editing, event).await;
                if send_frames(&mut socket, &frames).await.is_err() {
                    break;
                }
            }
        }
    }

    close_editing(&state, &mut editing).await;
    info!(%client_id, "ws: client disconnected");
}

/// Next sync event of the open session; pends forever when none is open.
async fn next_sync_event(editing: &mut Option<Editing>) -> SyncEvent {
    match editing {
        Some(ed) => ed.engine.next_event().await,
        None => std::future::pending().await,
    }
}

async fn close_editing(state: &AppState, editing: &mut Option<Editing>) {
    let Some(Editing { mut session, engine }) = editing.take() else {
        return;
    };
    engine.unmount(&mut session).await;
    state.presence.leave(session.presentation_id, &session.username).await;
    info!(presentation_id = %session.presentation_id, username = %session.username, "ws: presentation closed");
}

// =============================================================================
// SYNC EVENTS
// =============================================================================

/// Apply one sync event and return the frames to push to the client.
async fn process_sync_event(state: &AppState, editing: &mut Option<Editing>, event: SyncEvent) -> Vec<Frame> {
    let Some(ed) = editing.as_mut() else {
        return Vec::new();
    };
    let presentation_id = ed.session.presentation_id;

    let update = match event {
        SyncEvent::Remote => ed.engine.apply_remote(&mut ed.session).await,
        SyncEvent::Local(change) => {
            ed.engine.on_local_change(&mut ed.session, &change).await;
            return Vec::new();
        }
        SyncEvent::Settle => {
            ed.engine.on_settle(&mut ed.session);
            return Vec::new();
        }
        SyncEvent::Closed => RemoteUpdate::Missing,
    };

    match update {
        RemoteUpdate::Missing => {
            close_editing(state, editing).await;
            vec![Frame::request("presentation:missing", Data::new()).with_presentation_id(presentation_id)]
        }
        RemoteUpdate::Bootstrapped => vec![changed_frame(&ed.session), loaded_frame(&ed.session)],
        RemoteUpdate::Applied { reloaded } => {
            let mut frames = vec![changed_frame(&ed.session)];
            if reloaded {
                frames.push(loaded_frame(&ed.session));
            }
            frames
        }
    }
}

fn changed_frame(session: &Session) -> Frame {
    let mut data = Data::new();
    data.insert("slides".into(), json!(session.slides));
    data.insert("users".into(), json!(session.users));
    data.insert("current_slide_index".into(), json!(session.current_slide_index));
    data.insert("role".into(), json!(session.role));
    Frame::request("presentation:changed", data).with_presentation_id(session.presentation_id)
}

fn loaded_frame(session: &Session) -> Frame {
    Frame::request("slide:loaded", Data::new())
        .with_presentation_id(session.presentation_id)
        .with_data("index", session.current_slide_index)
        .with_data("canvas_data", session.surface.serialize())
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch without a socket.
async fn process_inbound_text(
    state: &AppState,
    editing: &mut Option<Editing>,
    client_id: Uuid,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    if let Some(ed) = editing.as_ref() {
        req.from = Some(ed.session.username.clone());
    }

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    let result = match req.prefix() {
        "presentation" => handle_presentation(state, editing, &req).await,
        "canvas" => match open_session(editing, &req) {
            Ok(ed) => handle_canvas(ed, &req).await,
            Err(err) => Err(err),
        },
        "slide" => match open_session(editing, &req) {
            Ok(ed) => handle_slide(ed, &req).await,
            Err(err) => Err(err),
        },
        "user" => match open_session(editing, &req) {
            Ok(ed) => handle_user(state, ed, &req).await,
            Err(err) => Err(err),
        },
        "export" => match open_session(editing, &req) {
            Ok(ed) => handle_export(ed, &req).await,
            Err(err) => Err(err),
        },
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Ignored) => {
            info!(%client_id, syscall = %req.syscall, "ws: action not permitted for role");
            vec![req.done_with(applied(false))]
        }
        Ok(Outcome::ReplyAndLoad(data)) => {
            let mut frames = vec![req.done_with(data)];
            if let Some(ed) = editing.as_ref() {
                frames.push(loaded_frame(&ed.session));
            }
            frames
        }
        Err(err_frame) => vec![err_frame],
    }
}

fn open_session<'a>(editing: &'a mut Option<Editing>, req: &Frame) -> Result<&'a mut Editing, Frame> {
    editing
        .as_mut()
        .ok_or_else(|| req.error("open a presentation first"))
}

fn applied(flag: bool) -> Data {
    let mut data = Data::new();
    data.insert("applied".into(), Value::Bool(flag));
    data
}

// =============================================================================
// PRESENTATION HANDLERS
// =============================================================================

async fn handle_presentation(state: &AppState, editing: &mut Option<Editing>, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "open" => {
            let Some(presentation_id) = req
                .presentation_id
                .or_else(|| req.str_field("presentation_id").and_then(|s| s.parse().ok()))
            else {
                return Err(req.error("presentation_id required"));
            };
            let Some(username) = req.str_field("username").map(str::trim).filter(|s| !s.is_empty()) else {
                return Err(req.error("username required"));
            };

            close_editing(state, editing).await;

            let mut session = Session::new(presentation_id, username, Box::new(Canvas::new()));
            let (engine, first) = SyncEngine::mount(state.store.clone(), &mut session, state.sync)
                .await
                .map_err(|e| req.error_from(&e))?;
            if first == RemoteUpdate::Missing {
                engine.unmount(&mut session).await;
                return Err(req.error_from(&PresentationError::NotFound(presentation_id)));
            }

            state.presence.enter(presentation_id, &session.username).await;
            info!(%presentation_id, username = %session.username, role = %session.role, "ws: presentation opened");

            let mut data = Data::new();
            data.insert("username".into(), json!(session.username));
            data.insert("role".into(), json!(session.role));
            data.insert("slides".into(), json!(session.slides));
            data.insert("users".into(), json!(session.users));
            data.insert("current_slide_index".into(), json!(session.current_slide_index));
            data.insert("canvas_data".into(), json!(session.surface.serialize()));

            *editing = Some(Editing { session, engine });
            Ok(Outcome::Reply(data))
        }
        "close" => {
            close_editing(state, editing).await;
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown presentation op: {op}"))),
    }
}

// =============================================================================
// CANVAS HANDLERS
// =============================================================================

async fn handle_canvas(ed: &mut Editing, req: &Frame) -> Result<Outcome, Frame> {
    let Editing { session, engine } = ed;

    match req.op() {
        "add" => {
            if !session.can(Action::AddShape) {
                return Ok(Outcome::Ignored);
            }
            let Some(raw) = req.data.get("object") else {
                return Err(req.error("object required"));
            };
            let object: CanvasObject =
                serde_json::from_value(raw.clone()).map_err(|e| req.error(format!("invalid object: {e}")))?;
            let id = session.surface.add_object(object);
            let mut data = applied(true);
            data.insert("id".into(), json!(id));
            Ok(Outcome::Reply(data))
        }
        "modify" => {
            if !session.can(Action::Draw) {
                return Ok(Outcome::Ignored);
            }
            let Some(id) = req.str_field("id") else {
                return Err(req.error("id required"));
            };
            let Some(props) = req.data.get("props").and_then(Value::as_object) else {
                return Err(req.error("props required"));
            };
            let Some(current) = session.surface.objects().iter().find(|o| o.id.as_deref() == Some(id)) else {
                return Err(req.error_from(&SurfaceError::ObjectNotFound(id.to_owned())));
            };
            let merged = merge_props(current, props).map_err(|e| req.error(format!("invalid props: {e}")))?;
            session.surface.modify_object(id, &mut |obj| *obj = merged.clone());
            Ok(Outcome::Reply(applied(true)))
        }
        "remove" => {
            if !session.can(Action::DeleteObject) {
                return Ok(Outcome::Ignored);
            }
            let removed = match req.data.get("ids").and_then(Value::as_array) {
                Some(ids) => {
                    let removed = ids
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|id| session.surface.remove_object(id).is_some())
                        .count();
                    if removed > 0 {
                        session.surface.discard_active_object();
                        session.surface.render_all();
                    }
                    removed
                }
                None => tools::delete_selected(session.surface.as_mut()),
            };
            engine.force_save(session).await.map_err(|e| req.error_from(&e))?;
            let mut data = applied(removed > 0);
            data.insert("removed".into(), json!(removed));
            Ok(Outcome::Reply(data))
        }
        "path" => {
            if !session.can(Action::Draw) {
                return Ok(Outcome::Ignored);
            }
            let points = parse_points(req.data.get("path")).ok_or_else(|| req.error("path must be [[x, y], ...]"))?;
            let mut brush = Brush::default();
            if let Some(color) = req.str_field("stroke") {
                color.clone_into(&mut brush.color);
            }
            if let Some(width) = req.data.get("stroke_width").and_then(Value::as_f64) {
                brush.width = width;
            }
            let path = tools::path_from_points(&points, &brush).map_err(|e| req.error_from(&e))?;
            let id = session.surface.add_path(path);
            let mut data = applied(true);
            data.insert("id".into(), json!(id));
            Ok(Outcome::Reply(data))
        }
        "select" => {
            let ids: Vec<String> = req
                .data
                .get("ids")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                .unwrap_or_default();
            if ids.is_empty() {
                session.surface.discard_active_object();
            } else {
                session.surface.set_active_objects(&ids);
            }
            Ok(Outcome::Done)
        }
        "tool" => {
            if !session.can(Action::AddShape) {
                return Ok(Outcome::Ignored);
            }
            let tool = req.str_field("tool").unwrap_or_default();
            let id = if tool == "image" {
                let src = req.str_field("src").unwrap_or_default();
                let natural = req
                    .data
                    .get("width")
                    .and_then(Value::as_f64)
                    .zip(req.data.get("height").and_then(Value::as_f64));
                tools::create_image(session.surface.as_mut(), src, natural).map_err(|e| req.error_from(&e))?
            } else {
                let Some(shape) = Shape::parse(tool) else {
                    return Err(req.error(format!("unknown tool: {tool}")));
                };
                tools::create_shape(session.surface.as_mut(), shape)
            };
            engine.force_save(session).await.map_err(|e| req.error_from(&e))?;
            let mut data = applied(true);
            data.insert("id".into(), json!(id));
            data.insert("canvas_data".into(), json!(session.surface.serialize()));
            Ok(Outcome::Reply(data))
        }
        "mode" => match req.str_field("mode") {
            Some("select") => {
                tools::enable_select(session.surface.as_mut());
                Ok(Outcome::Reply(drawing(false)))
            }
            Some("draw") => {
                if !session.can(Action::Draw) {
                    return Ok(Outcome::Ignored);
                }
                tools::enable_drawing(session.surface.as_mut());
                Ok(Outcome::Reply(drawing(true)))
            }
            _ => Err(req.error("mode must be select or draw")),
        },
        "style" => {
            if !session.can(Action::ChangeStyle) {
                return Ok(Outcome::Ignored);
            }
            let change = parse_style(&req.data).ok_or_else(|| req.error("style change required"))?;
            let changed = tools::apply_style(session.surface.as_mut(), &change);
            let mut data = applied(changed);
            if changed {
                engine.force_save(session).await.map_err(|e| req.error_from(&e))?;
                data.insert("canvas_data".into(), json!(session.surface.serialize()));
            }
            Ok(Outcome::Reply(data))
        }
        "save" => {
            engine.force_save(session).await.map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown canvas op: {op}"))),
    }
}

fn drawing(on: bool) -> Data {
    let mut data = Data::new();
    data.insert("drawing".into(), Value::Bool(on));
    data
}

/// Overlay `props` on an object's serialized form. The id is kept.
fn merge_props(
    current: &CanvasObject,
    props: &serde_json::Map<String, Value>,
) -> Result<CanvasObject, serde_json::Error> {
    let mut value = serde_json::to_value(current)?;
    if let Value::Object(fields) = &mut value {
        for (key, prop) in props {
            if key != "id" {
                fields.insert(key.clone(), prop.clone());
            }
        }
    }
    serde_json::from_value(value)
}

fn parse_points(raw: Option<&Value>) -> Option<Vec<(f64, f64)>> {
    raw?.as_array()?
        .iter()
        .map(|point| match point.as_array()?.as_slice() {
            [x, y] => Some((x.as_f64()?, y.as_f64()?)),
            _ => None,
        })
        .collect()
}

fn parse_style(data: &Data) -> Option<StyleChange> {
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_owned);

    if let Some(width) = data.get("stroke_width").and_then(Value::as_f64) {
        return Some(StyleChange::StrokeWidth(width));
    }
    if let Some(color) = text("stroke") {
        return Some(StyleChange::Stroke(color));
    }
    if let Some(color) = text("fill") {
        return Some(StyleChange::Fill(color));
    }
    if let Some(gradient) = data.get("gradient") {
        let start = gradient.get("start")?.as_str()?.to_owned();
        let end = gradient.get("end")?.as_str()?.to_owned();
        return Some(StyleChange::Gradient { start, end });
    }
    if let Some(family) = text("font_family") {
        return Some(StyleChange::FontFamily(family));
    }
    match data.get("font_weight") {
        Some(Value::String(weight)) => Some(StyleChange::FontWeight(weight.clone())),
        Some(Value::Number(weight)) => Some(StyleChange::FontWeight(weight.to_string())),
        _ => None,
    }
}

// =============================================================================
// SLIDE HANDLERS
// =============================================================================

async fn handle_slide(ed: &mut Editing, req: &Frame) -> Result<Outcome, Frame> {
    let Editing { session, engine } = ed;

    let result = match req.op() {
        "add" => slides::add_slide(session, engine).await,
        "remove" => slides::remove_slide(session, engine).await,
        "switch" => {
            let target = if let Some(index) = req.data.get("index").and_then(Value::as_u64) {
                SlideTarget::Index(usize::try_from(index).unwrap_or(usize::MAX))
            } else if let Some(id) = req.str_field("id") {
                SlideTarget::Id(id.to_owned())
            } else {
                return Err(req.error("index or id required"));
            };
            slides::switch_slide(session, engine, &target).await
        }
        op => return Err(req.error(format!("unknown slide op: {op}"))),
    };

    match result {
        Ok(index) => {
            let mut data = applied(true);
            data.insert("index".into(), json!(index));
            data.insert("slide_count".into(), json!(session.slides.len()));
            Ok(Outcome::ReplyAndLoad(data))
        }
        Err(e) if e.is_silent() => Ok(Outcome::Ignored),
        Err(e) => Err(req.error_from(&e)),
    }
}

// =============================================================================
// USER HANDLERS
// =============================================================================

async fn handle_user(state: &AppState, ed: &mut Editing, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "role" => {
            let Some(target) = req.str_field("name") else {
                return Err(req.error("name required"));
            };
            let Some(role) = req.str_field("role").and_then(Role::parse) else {
                return Err(req.error("role must be creator, editor, or viewer"));
            };
            let session = &mut ed.session;
            match presentation::set_role(state.store.as_ref(), session.presentation_id, &session.username, target, role)
                .await
            {
                Ok(users) => {
                    session.users.clone_from(&users);
                    let mut data = applied(true);
                    data.insert("users".into(), json!(users));
                    Ok(Outcome::Reply(data))
                }
                Err(e) if e.is_silent() => Ok(Outcome::Ignored),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown user op: {op}"))),
    }
}

// =============================================================================
// EXPORT HANDLERS
// =============================================================================

async fn handle_export(ed: &mut Editing, req: &Frame) -> Result<Outcome, Frame> {
    let Editing { session, engine } = ed;

    match req.op() {
        "pdf" => {
            if !session.can(Action::Export) {
                return Ok(Outcome::Ignored);
            }
            let Some(scope) = ExportScope::parse(req.str_field("scope"), session.current_slide_index) else {
                return Err(req.error("scope must be current or all"));
            };
            engine.force_save(session).await.map_err(|e| req.error_from(&e))?;

            let selected = export::select(&session.slides, scope)
                .map_err(|e| req.error_from(&e))?
                .to_vec();
            let pages = selected.len();
            let pdf = tokio::task::spawn_blocking(move || export::render_pdf(&selected))
                .await
                .map_err(|e| req.error(format!("pdf render task failed: {e}")))?
                .map_err(|e| req.error_from(&e))?;

            info!(presentation_id = %session.presentation_id, pages, bytes = pdf.len(), "ws: pdf exported");
            let mut data = Data::new();
            data.insert("pages".into(), json!(pages));
            data.insert("pdf".into(), json!(base64::engine::general_purpose::STANDARD.encode(&pdf)));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown export op: {op}"))),
    }
}

// =============================================================================
// SEND HELPERS
// =============================================================================

async fn send_frames(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), ()> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
