//! A small pathwise application over the controller tree in `demos/app`.
//!
//! Run from the crate root with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api
//!   curl http://localhost:3000/api/users/active
//!   curl http://localhost:3000/api/users/42
//!   curl -X DELETE http://localhost:3000/api/users/42 -H 'authorization: Bearer t'
//!   curl http://localhost:3000/api/files/docs/guide.md
//!   curl http://localhost:3000/public/app.css
//!
//! Production mode reads the compiled manifest instead of the tree:
//!   cargo run --bin pathwise -- --config demos/pathwise.toml routes build
//!   PATHWISE_ENV=production cargo run --example basic

use std::path::Path;

use pathwise::{App, Controller, ControllerRegistry, Fault, Method, Request, Settings};

#[path = "app/main/controllers/index.rs"]
mod home;
#[path = "app/main/controllers/users/active.rs"]
mod users_active;
#[path = "app/main/controllers/users/[id]/index.rs"]
mod users_show;
#[path = "app/main/controllers/files/[...].rs"]
mod files;

#[tokio::main]
async fn main() -> Result<(), pathwise::Error> {
    tracing_subscriber::fmt::init();

    let settings = Settings::load(Path::new("demos/pathwise.toml"))?;

    let registry = ControllerRegistry::new()
        .register("main/index", Controller::new().get(home::get))
        .register("main/users/active", Controller::new().get(users_active::get))
        .register(
            "main/users/[id]/index",
            Controller::new()
                .get(users_show::get)
                .delete(users_show::delete)
                .before(Method::Delete, users_show::require_token),
        )
        .register("main/files/[...]", Controller::new().get(files::get));

    App::new(settings)
        .controllers(registry)
        .middleware(powered_by)
        .serve()
        .await
}

fn powered_by(req: &mut Request) -> Result<(), Fault> {
    req.response().header("x-powered-by", "pathwise");
    Ok(())
}
