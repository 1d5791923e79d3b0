//! Demo application built on appbase.
//!
//! - `appbase-demo init` writes `.settings.yml`
//! - `appbase-demo run` serves `/`, `/notes` (kept in `data.db`) and the
//!   `/api/ping` and `/api/echo` API handlers

use std::path::Path;

use appbase::{
    ApiError, ApiRequest, ApiResult, AppBase, AppHooks, AppSettings, AppSettingsBase, BuildInfo,
    database::{DB_FILE_NAME, DbModel, DbSchema},
};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DemoSettings {
    #[serde(flatten)]
    base: AppSettingsBase,
    greeting: String,
}

impl AppSettings for DemoSettings {
    fn base(&self) -> &AppSettingsBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AppSettingsBase {
        &mut self.base
    }
}

struct Note;

impl DbModel for Note {
    const TABLE: &'static str = "note";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[("title", "TEXT NOT NULL DEFAULT ''")];
}

struct DemoHooks {
    schema: DbSchema,
}

#[async_trait::async_trait]
impl AppHooks<DemoSettings> for DemoHooks {
    async fn pre_run(&mut self, settings: &DemoSettings) -> anyhow::Result<()> {
        self.schema
            .open(Path::new(DB_FILE_NAME), settings.base.log_sql)
            .await?;
        Ok(())
    }

    async fn post_run(&mut self, _settings: &DemoSettings) -> anyhow::Result<()> {
        self.schema.close().await;
        Ok(())
    }

    fn print_info(&self, settings: &DemoSettings) {
        println!("Greeting: {}", settings.greeting);
    }

    fn build_router(&self, router: Router, settings: &DemoSettings) -> Router {
        let greeting = settings.greeting.clone();
        let router = router.route("/", get(move || async move { greeting }));

        match self.schema.db() {
            Some(pool) => router.merge(
                Router::new()
                    .route("/notes", get(count_notes).post(add_note))
                    .with_state(pool.clone()),
            ),
            None => router,
        }
    }
}

async fn count_notes(State(pool): State<SqlitePool>) -> Result<String, StatusCode> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note")
        .fetch_one(&pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(format!("{count} notes"))
}

async fn add_note(State(pool): State<SqlitePool>, title: String) -> StatusCode {
    match sqlx::query("INSERT INTO note (title) VALUES (?1)")
        .bind(title)
        .execute(&pool)
        .await
    {
        Ok(_) => StatusCode::CREATED,
        Err(err) => {
            tracing::error!("storing note failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn ping(_request: ApiRequest) -> ApiResult {
    Ok(json!({ "pong": true }))
}

async fn echo(request: ApiRequest) -> ApiResult {
    let message = request
        .param("message")
        .ok_or_else(|| ApiError::bad_request("message required"))?;
    Ok(json!({ "message": message }))
}

#[tokio::main]
async fn main() {
    let mut schema = DbSchema::new();
    schema.add_model::<Note>();

    let settings = DemoSettings {
        greeting: "Hello from appbase".to_string(),
        ..Default::default()
    };

    let build = BuildInfo::new(
        option_env!("APPBASE_VERSION").unwrap_or(appbase::DEV_MODE_LABEL),
        option_env!("APPBASE_COMMIT").unwrap_or(appbase::DEV_MODE_LABEL),
        option_env!("APPBASE_BUILD_TIME").unwrap_or(appbase::DEV_MODE_LABEL),
    );

    AppBase::new(settings, DemoHooks { schema })
        .executable_name("appbase-demo")
        .app_name("AppBase Demo")
        .long_description("example application skeleton")
        .build_info(build)
        .web_api_prefix("/api")
        .web_api_enable_get(true)
        .api_handler("ping", ping)
        .api_handler("echo", echo)
        .run()
        .await;
}
