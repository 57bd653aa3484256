//! Basic example of the Ambar DI container.

use ambar::prelude::*;
use ambar::upcast;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

impl Injectable for ConsoleLogger {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(vec![], |_| Ok(ConsoleLogger))]
    }
}

upcast!(ConsoleLogger => dyn Logger);

struct Config {
    database_url: String,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
    closed: AtomicBool,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Dispose for Database {
    fn dispose(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.logger.log("Database connection closed");
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl Injectable for UserRepository {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(vec![Parameter::of::<Database>()], |args| {
            Ok(UserRepository { db: args.required::<Database>(0)? })
        })]
    }
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl Injectable for UserService {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(
            vec![Parameter::of::<UserRepository>(), Parameter::of::<dyn Logger>()],
            |args| {
                Ok(UserService {
                    repo: args.required::<UserRepository>(0)?,
                    logger: args.required::<dyn Logger>(1)?,
                })
            },
        )]
    }
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("ambar_container=debug")
        .init();

    let container = Container::with_options(ContainerOptions::default().validate_scopes(true));

    // Config: prebuilt singleton
    container.add(Registration::instance(Arc::new(Config {
        database_url: "postgres://localhost/myapp".to_string(),
    })));
    // Logger: singleton
    container.add(Registration::bind::<dyn Logger, ConsoleLogger>(Lifetime::Singleton));
    // Database: singleton built by a factory, disposed with the root
    container.add(Registration::of::<Database>(Lifetime::Singleton).with_factory(Arc::new(
        |r: &dyn Resolver| -> Result<Instance> {
            let config = r.resolve_required::<Config>()?;
            let logger = r.resolve_required::<dyn Logger>()?;
            Ok(Instance::disposable(Arc::new(Database {
                url: config.database_url.clone(),
                logger,
                closed: AtomicBool::new(false),
            })))
        },
    )));
    // UserRepository: scoped (one per request)
    container.add(Registration::activated::<UserRepository>(Lifetime::Scoped));
    // UserService: transient (new each time)
    container.add(Registration::activated::<UserService>(Lifetime::Transient));

    container.validate()?;
    println!("Container is valid");
    println!("{container:?}");

    let config = container.resolve_required::<Config>()?;
    println!("Config: database_url={}", config.database_url);

    // === Create a scope (e.g., for an HTTP request) ===
    {
        let scope = container.create_scope();

        let service = scope.resolve_required::<UserService>()?;
        println!("{}", service.get_user(42));

        // Resolve again in same scope: UserRepository is reused
        let service2 = scope.resolve_required::<UserService>()?;
        println!("{}", service2.get_user(7));
        assert!(Arc::ptr_eq(&service.repo, &service2.repo));
    }
    // scope dropped: its scoped instances are disposed

    let loggers = container.resolve_all::<dyn Logger>()?;
    println!("{} logger(s) registered", loggers.len());

    let db = container.resolve_required::<Database>()?;
    container.dispose();
    assert!(db.closed.load(Ordering::SeqCst));

    println!("Everything works!");
    Ok(())
}
