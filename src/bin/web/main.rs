//! Single binary web server: JSON API over the tournament store, plus the
//! periodic job that emails players of current matchups.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. See `tourney::Settings` for the environment variables.

use actix_web::{
    delete, get, post, put,
    web::{self, Bytes, Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tourney::{
    bracket_json, generate_bracket, generate_pool_matches, notify_players_shared, pool_standings,
    send_current_matchups_shared, Bracket, BracketJson, Mailer, MatchId, NotifyOutcome, Outbox,
    PlayerId, Pool, Settings, SmtpMailer, Store, Tournament, TournamentError,
};
use uuid::Uuid;

/// In-memory store shared by all handlers. Mail is never sent while the lock is held.
type AppState = Data<RwLock<Store>>;

/// Settings and the mail sender.
struct AppContext {
    settings: Settings,
    mailer: Box<dyn Mailer>,
}

type AppCtx = Data<AppContext>;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct CreatePlayerBody {
    name: String,
    email: String,
}

#[derive(Deserialize)]
struct CreateTournamentBody {
    name: String,
    #[serde(default)]
    player_ids: Vec<PlayerId>,
}

#[derive(Deserialize)]
struct CreateBracketBody {
    name: String,
}

#[derive(Deserialize)]
struct GenerateBracketBody {
    /// Defaults to the tournament's players.
    player_ids: Option<Vec<PlayerId>>,
}

#[derive(Deserialize)]
struct CreatePoolBody {
    #[serde(default)]
    player_ids: Vec<PlayerId>,
}

#[derive(Deserialize)]
struct RoundWindowBody {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ScoreBody {
    player_1_score: u32,
    player_2_score: u32,
}

/// Path segment: tournament slug (e.g. /api/tournaments/{slug})
#[derive(Deserialize)]
struct SlugPath {
    slug: String,
}

/// Path segment: entity id (e.g. /api/matches/{id})
#[derive(Deserialize)]
struct IdPath {
    id: Uuid,
}

#[derive(Serialize)]
struct TournamentDetail<'a> {
    tournament: &'a Tournament,
    brackets: Vec<&'a Bracket>,
    pools: Vec<&'a Pool>,
    /// Display data of the tournament's first bracket.
    bracket_json: Option<BracketJson>,
}

#[derive(Serialize)]
struct MatchupEntry {
    match_id: MatchId,
    sent: bool,
    /// Whether the sent notification reached the snapshot. None when nothing was sent.
    saved: Option<bool>,
    message: String,
}

fn error_response(e: TournamentError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        TournamentError::LockPoisoned => HttpResponse::InternalServerError().json(body),
        e if e.is_not_found() => HttpResponse::NotFound().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn lock_error() -> HttpResponse {
    HttpResponse::InternalServerError().body("lock error")
}

/// Write the snapshot if a data file is configured.
fn persist(ctx: &AppContext, store: &Store) -> Result<(), TournamentError> {
    match &ctx.settings.data_file {
        Some(path) => store.save(path).inspect_err(|e| {
            log::error!("Could not save store to {}: {e}", path.display());
        }),
        None => Ok(()),
    }
}

fn persist_shared(ctx: &AppContext, state: &RwLock<Store>) -> Result<(), TournamentError> {
    let store = state.read().map_err(|_| TournamentError::LockPoisoned)?;
    persist(ctx, &store)
}

/// The change is applied in memory but the snapshot write failed.
fn unsaved_response(e: TournamentError) -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("The change was applied but could not be saved: {e}"),
    }))
}

/// 200 with `body` once the snapshot is written.
fn saved<T: Serialize>(ctx: &AppContext, store: &Store, body: T) -> HttpResponse {
    match persist(ctx, store) {
        Ok(()) => HttpResponse::Ok().json(body),
        Err(e) => unsaved_response(e),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "tourney",
    })
}

#[get("/api/site")]
async fn api_site(ctx: AppCtx) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "site_name": ctx.settings.site_name }))
}

/// Register a player.
#[post("/api/players")]
async fn api_create_player(state: AppState, ctx: AppCtx, body: Json<CreatePlayerBody>) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let result = store
        .create_player(&body.name, &body.email)
        .and_then(|id| store.player(id).cloned());
    match result {
        Ok(player) => saved(&ctx, &store, player),
        Err(e) => error_response(e),
    }
}

/// Register every row of a `name,email` CSV body.
#[post("/api/players/import")]
async fn api_import_players(state: AppState, ctx: AppCtx, body: Bytes) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match store.import_players_csv(&body[..]) {
        Ok(ids) => saved(&ctx, &store, ids),
        Err(e) => error_response(e),
    }
}

/// Create a tournament with its players.
#[post("/api/tournaments")]
async fn api_create_tournament(
    state: AppState,
    ctx: AppCtx,
    body: Json<CreateTournamentBody>,
) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    if let Some(e) = body.player_ids.iter().find_map(|&pid| store.player(pid).err()) {
        return error_response(e);
    }
    let result = store.create_tournament(&body.name).and_then(|id| {
        for &pid in &body.player_ids {
            store.add_tournament_player(id, pid)?;
        }
        store.tournament(id).cloned()
    });
    match result {
        Ok(tournament) => saved(&ctx, &store, tournament),
        Err(e) => error_response(e),
    }
}

/// Tournament with its brackets, pools and the first bracket's display data.
#[get("/api/tournaments/{slug}")]
async fn api_get_tournament(state: AppState, path: Path<SlugPath>) -> HttpResponse {
    let store = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let tournament = match store.tournament_by_slug(&path.slug) {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    let brackets = store.brackets_of(tournament.id);
    let bracket_json = match brackets.first() {
        Some(b) => match bracket_json(&store, b.id) {
            Ok(json) => Some(json),
            Err(e) => return error_response(e),
        },
        None => None,
    };
    HttpResponse::Ok().json(TournamentDetail {
        tournament,
        brackets,
        pools: store.pools_of(tournament.id),
        bracket_json,
    })
}

/// Add a bracket to a tournament.
#[post("/api/tournaments/{slug}/brackets")]
async fn api_create_bracket(
    state: AppState,
    ctx: AppCtx,
    path: Path<SlugPath>,
    body: Json<CreateBracketBody>,
) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let result = store
        .tournament_by_slug(&path.slug)
        .map(|t| t.id)
        .and_then(|tid| store.create_bracket(tid, &body.name))
        .and_then(|id| store.bracket(id).cloned());
    match result {
        Ok(bracket) => saved(&ctx, &store, bracket),
        Err(e) => error_response(e),
    }
}

/// Build the bracket's rounds and matches (once).
#[post("/api/brackets/{id}/generate")]
async fn api_generate_bracket(
    state: AppState,
    ctx: AppCtx,
    path: Path<IdPath>,
    body: Option<Json<GenerateBracketBody>>,
) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let requested = body.and_then(|b| b.into_inner().player_ids);
    let players = match requested {
        Some(ids) => ids,
        None => match store
            .bracket(path.id)
            .and_then(|b| store.tournament(b.tournament))
        {
            Ok(t) => t.players.clone(),
            Err(e) => return error_response(e),
        },
    };
    let result = generate_bracket(&mut store, path.id, &players)
        .and_then(|_| bracket_json(&store, path.id));
    match result {
        Ok(json) => saved(&ctx, &store, json),
        Err(e) => error_response(e),
    }
}

/// Bracket display data (teams and results).
#[get("/api/brackets/{id}/json")]
async fn api_bracket_json(state: AppState, path: Path<IdPath>) -> HttpResponse {
    let store = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match bracket_json(&store, path.id) {
        Ok(json) => HttpResponse::Ok().json(json),
        Err(e) => error_response(e),
    }
}

/// Add a pool with its players to a tournament.
#[post("/api/tournaments/{slug}/pools")]
async fn api_create_pool(
    state: AppState,
    ctx: AppCtx,
    path: Path<SlugPath>,
    body: Json<CreatePoolBody>,
) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    if let Some(e) = body.player_ids.iter().find_map(|&pid| store.player(pid).err()) {
        return error_response(e);
    }
    let result = store
        .tournament_by_slug(&path.slug)
        .map(|t| t.id)
        .and_then(|tid| store.create_pool(tid))
        .and_then(|id| {
            for &pid in &body.player_ids {
                store.add_pool_player(id, pid)?;
            }
            store.pool(id).cloned()
        });
    match result {
        Ok(pool) => saved(&ctx, &store, pool),
        Err(e) => error_response(e),
    }
}

/// Build the pool's round-robin schedule (once).
#[post("/api/pools/{id}/generate")]
async fn api_generate_pool(state: AppState, ctx: AppCtx, path: Path<IdPath>) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match generate_pool_matches(&mut store, path.id) {
        Ok(schedule) => saved(&ctx, &store, schedule),
        Err(e) => error_response(e),
    }
}

/// Pool standings, most wins first.
#[get("/api/pools/{id}/standings")]
async fn api_pool_standings(state: AppState, path: Path<IdPath>) -> HttpResponse {
    let store = match state.read() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    match pool_standings(&store, path.id) {
        Ok(standings) => HttpResponse::Ok().json(standings),
        Err(e) => error_response(e),
    }
}

/// Set the notification window of a round.
#[put("/api/rounds/{id}/window")]
async fn api_set_round_window(
    state: AppState,
    ctx: AppCtx,
    path: Path<IdPath>,
    body: Json<RoundWindowBody>,
) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let result = store
        .set_round_window(path.id, body.start, body.end)
        .and_then(|()| store.round(path.id).cloned());
    match result {
        Ok(round) => saved(&ctx, &store, round),
        Err(e) => error_response(e),
    }
}

/// Record a match result.
#[put("/api/matches/{id}/score")]
async fn api_record_score(
    state: AppState,
    ctx: AppCtx,
    path: Path<IdPath>,
    body: Json<ScoreBody>,
) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let result = store
        .record_score(path.id, body.player_1_score, body.player_2_score)
        .and_then(|()| store.game_match(path.id).cloned());
    match result {
        Ok(m) => saved(&ctx, &store, m),
        Err(e) => error_response(e),
    }
}

/// Remove a recorded result.
#[delete("/api/matches/{id}/score")]
async fn api_clear_score(state: AppState, ctx: AppCtx, path: Path<IdPath>) -> HttpResponse {
    let mut store = match state.write() {
        Ok(guard) => guard,
        Err(_) => return lock_error(),
    };
    let result = store
        .clear_score(path.id)
        .and_then(|()| store.game_match(path.id).cloned());
    match result {
        Ok(m) => saved(&ctx, &store, m),
        Err(e) => error_response(e),
    }
}

/// Email the players of one match (no-op if already notified).
#[post("/api/matches/{id}/notify")]
async fn api_notify_players(state: AppState, ctx: AppCtx, path: Path<IdPath>) -> HttpResponse {
    let match_id = path.id;
    // Sending blocks on SMTP, so it runs off the async workers.
    let result = web::block(move || {
        let outcome = notify_players_shared(
            &state,
            ctx.mailer.as_ref(),
            &ctx.settings.notify_settings(),
            match_id,
            Utc::now(),
        )?;
        let saved = match outcome {
            NotifyOutcome::Sent(_) => persist_shared(&ctx, &state),
            _ => Ok(()),
        };
        Ok::<_, TournamentError>((outcome, saved))
    })
    .await;
    match result {
        Ok(Ok((outcome, Ok(())))) => HttpResponse::Ok().json(serde_json::json!({
            "sent": matches!(outcome, NotifyOutcome::Sent(_)),
            "message": outcome.message(),
        })),
        Ok(Ok((outcome, Err(e)))) => HttpResponse::InternalServerError().json(serde_json::json!({
            "sent": true,
            "message": outcome.message(),
            "error": format!("The notification was sent but could not be saved: {e}"),
        })),
        Ok(Err(e)) => error_response(e),
        Err(_) => HttpResponse::InternalServerError().body("notification task failed"),
    }
}

/// Run the current-matchups job once.
#[post("/api/notifications/current")]
async fn api_send_current_matchups(state: AppState, ctx: AppCtx) -> HttpResponse {
    match web::block(move || run_current_matchups(&state, &ctx)).await {
        Ok(Ok(entries)) if entries.iter().any(|e| e.saved == Some(false)) => {
            HttpResponse::InternalServerError().json(entries)
        }
        Ok(Ok(entries)) => HttpResponse::Ok().json(entries),
        Ok(Err(e)) => error_response(e),
        Err(_) => HttpResponse::InternalServerError().body("notification task failed"),
    }
}

/// Notify every current matchup, then save the snapshot once.
fn run_current_matchups(
    state: &RwLock<Store>,
    ctx: &AppContext,
) -> Result<Vec<MatchupEntry>, TournamentError> {
    let report = send_current_matchups_shared(
        state,
        ctx.mailer.as_ref(),
        &ctx.settings.notify_settings(),
        Utc::now(),
    )?;
    let mut entries: Vec<MatchupEntry> = report
        .into_iter()
        .map(|(match_id, outcome)| match outcome {
            Ok(outcome) => MatchupEntry {
                match_id,
                sent: matches!(outcome, NotifyOutcome::Sent(_)),
                saved: None,
                message: outcome.message(),
            },
            Err(e) => MatchupEntry {
                match_id,
                sent: false,
                saved: None,
                message: e.to_string(),
            },
        })
        .collect();
    if entries.iter().any(|e| e.sent) {
        let saved = persist_shared(ctx, state).is_ok();
        for entry in entries.iter_mut().filter(|e| e.sent) {
            entry.saved = Some(saved);
        }
    }
    Ok(entries)
}

fn load_store(settings: &Settings) -> std::io::Result<Store> {
    match &settings.data_file {
        Some(path) if path.exists() => {
            let store = Store::load(path).map_err(std::io::Error::other)?;
            log::info!("Loaded store from {}", path.display());
            Ok(store)
        }
        _ => Ok(Store::new()),
    }
}

fn build_mailer(settings: &Settings) -> std::io::Result<Box<dyn Mailer>> {
    match &settings.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp).map_err(std::io::Error::other)?;
            log::info!("Sending email through {}:{}", smtp.host, smtp.port);
            Ok(Box::new(mailer))
        }
        None => {
            log::warn!("EMAIL_HOST is not set: notifications are only logged");
            Ok(Box::new(Outbox::new()))
        }
    }
}


#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env().map_err(std::io::Error::other)?;
    let bind = (settings.host.clone(), settings.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let state = Data::new(RwLock::new(load_store(&settings)?));
    let ctx = Data::new(AppContext {
        mailer: build_mailer(&settings)?,
        settings,
    });

    // Background task: notify current matchups every NOTIFY_INTERVAL_SECS
    let job_state = state.clone();
    let job_ctx = ctx.clone();
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(job_ctx.settings.notify_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let (state, ctx) = (job_state.clone(), job_ctx.clone());
            match web::block(move || run_current_matchups(&state, &ctx)).await {
                Ok(Ok(entries)) => {
                    let sent = entries.iter().filter(|e| e.sent).count();
                    let unsaved = entries.iter().filter(|e| e.saved == Some(false)).count();
                    if sent > 0 {
                        log::info!("Sent {} matchup notification(s)", sent);
                    }
                    if unsaved > 0 {
                        log::error!("{} sent matchup notification(s) could not be saved", unsaved);
                    }
                }
                Ok(Err(e)) => log::error!("Skipping matchup notifications: {e}"),
                Err(e) => log::error!("Matchup notification task failed: {e}"),
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(ctx.clone())
            .service(api_health)
            .service(api_site)
            .service(api_create_player)
            .service(api_import_players)
            .service(api_create_tournament)
            .service(api_get_tournament)
            .service(api_create_bracket)
            .service(api_generate_bracket)
            .service(api_bracket_json)
            .service(api_create_pool)
            .service(api_generate_pool)
            .service(api_pool_standings)
            .service(api_set_round_window)
            .service(api_record_score)
            .service(api_clear_score)
            .service(api_notify_players)
            .service(api_send_current_matchups)
    })
    .bind(bind)?
    .run()
    .await
}
