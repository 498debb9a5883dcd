//! A small project-tracking API.
//!
//! ```text
//! cargo run --example basic
//!
//! curl localhost:3000/api/health
//! curl -XPOST localhost:3000/api/projects -H 'x-api-key: demo' \
//!      -H 'content-type: application/json' -d '{"name":"atlas"}'
//! curl localhost:3000/api/projects -H 'x-api-key: demo'
//! curl -XPOST localhost:3000/api/projects/1/attachments -H 'x-api-key: demo' -F file=@Cargo.toml
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use apibase::shape::{self, ShapeExt};
use apibase::{
    err, health, logging, resp, Config, Context, Dispatch, Endpoint, Error, Fault, Group, Next,
    Outcome, Request, Router, Server,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, Serialize)]
struct Project {
    id: String,
    name: String,
    archived: bool,
}

#[derive(Default)]
struct Store {
    next_id: u64,
    projects: BTreeMap<String, Project>,
}

type Db = Arc<Mutex<Store>>;

fn lock(db: &Db) -> Result<std::sync::MutexGuard<'_, Store>, Error> {
    db.lock().map_err(|_| Error::Io(std::io::Error::other("project store poisoned")))
}

async fn require_api_key(req: Request, next: Next) -> Dispatch {
    if req.header("x-api-key") != Some("demo") {
        return Err(Fault::Failure(err(401, "Missing or invalid API key", ())?));
    }
    next.run(req).await
}

fn project_shape() -> shape::ObjectShape {
    shape::object()
        .field("id", shape::string())
        .field("name", shape::string())
        .field("archived", shape::boolean())
}

fn list(db: Db) -> Endpoint {
    #[derive(Deserialize)]
    struct Query {
        archived: Option<bool>,
    }

    Endpoint::new(move |ctx: Context| {
        let db = Arc::clone(&db);
        async move {
            let q: Query = ctx.query()?;
            let projects: Vec<Project> = lock(&db)?
                .projects
                .values()
                .filter(|p| q.archived.is_none_or(|a| p.archived == a))
                .cloned()
                .collect();
            resp(200, "ok", json!({ "projects": projects }))
        }
    })
    .query(shape::object().field("archived", shape::boolean().coerce().optional()))
    .success(shape::object().field("projects", shape::array(project_shape())))
}

fn create(db: Db) -> Endpoint {
    #[derive(Deserialize)]
    struct Body {
        name: String,
    }

    Endpoint::new(move |ctx: Context| {
        let db = Arc::clone(&db);
        async move {
            let body: Body = ctx.body()?;
            let mut store = lock(&db)?;
            if store.projects.values().any(|p| p.name == body.name) {
                let taken = err(409, "Project already exists", json!({ "errCode": "NAME_TAKEN" }))?;
                return Ok(taken.into());
            }
            store.next_id += 1;
            let project =
                Project { id: store.next_id.to_string(), name: body.name, archived: false };
            store.projects.insert(project.id.clone(), project.clone());
            Ok::<Outcome, Error>(resp(201, "Project created", project)?.into())
        }
    })
    .body(shape::object().field("name", shape::string().min(1).max(80)))
    .success(project_shape())
    .failure(shape::object().field("errCode", shape::enumeration(["NAME_TAKEN"])))
}

fn archive(db: Db) -> Endpoint {
    Endpoint::new(move |ctx: Context| {
        let db = Arc::clone(&db);
        async move {
            let id = ctx.raw_params()["id"].as_str().unwrap_or_default().to_owned();
            let mut store = lock(&db)?;
            let Some(project) = store.projects.get_mut(&id) else {
                return Ok(err(404, "Project not found", ())?.into());
            };
            project.archived = true;
            Ok::<Outcome, Error>(resp(200, "Project archived", project.clone())?.into())
        }
    })
    .params(shape::object().field("id", shape::string()))
    .success(project_shape())
}

async fn attach(ctx: Context) -> Result<apibase::Success, Error> {
    let files: Vec<_> = ctx
        .files("file")
        .iter()
        .map(|f| json!({ "filename": f.filename, "mimetype": f.mime_type, "size": f.size }))
        .collect();
    resp(201, "Attachments received", json!({ "files": files }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env_overrides();
    logging::init(&config.log_filter);

    let db = Db::default();
    let api = Group::new("/api")
        .get("/health", health::endpoint())
        .layer(require_api_key)
        .nest(
            Group::new("/projects")
                .get("/", list(Arc::clone(&db)))
                .post("/", create(Arc::clone(&db)))
                .post("/:id/archive", archive(Arc::clone(&db)))
                .post(
                    "/:id/attachments",
                    Endpoint::new(attach)
                        .params(shape::object().field("id", shape::string()))
                        .file("file", 3)
                        .success(shape::object().field("files", shape::array(shape::any()))),
                ),
        );

    let router = Router::compile(api)?.configure(&config);
    Server::from_config(&config)?.serve(router).await
}
