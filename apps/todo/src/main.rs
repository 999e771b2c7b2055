//! A todo list kept in one remote object, driven through a namespace proxy.
//!
//! Run with `RUST_LOG=objproxy=debug` to watch the round trips.

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use objproxy::Args;
use objproxy::Config;
use objproxy::ListOptions;
use objproxy::LocalDirectory;
use objproxy::Namespace;
use objproxy::ObjectState;
use objproxy::RemoteObject;
use objproxy::TypeShape;
use objproxy::Value;
use objproxy::object;
use objproxy::objwire;
use objproxy::objwire::CONSTRUCTOR;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TODO_LIST_NAME: &str = "my-todos";
const TODO_PREFIX: &str = "todo:";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoItem {
    id: String,
    title: String,
    completed: bool,
    /// Milliseconds since the epoch of the last status change.
    status_changed: i64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

struct Todo {
    state: ObjectState,
}

impl Todo {
    async fn load(&self, id: &str) -> object::Result<TodoItem> {
        let value = self
            .state
            .storage()
            .get(id)
            .await?
            .ok_or_else(|| object::Error::msg(format!("No todo with id {}", id)))?;
        Ok(objwire::from_value(value)?)
    }

    async fn save(&self, item: &TodoItem) -> object::Result<Value> {
        let value = objwire::to_value(item)?;
        self.state.storage().put(&item.id, value.clone()).await?;
        Ok(value)
    }

    async fn add(&self, title: String) -> object::Result<Value> {
        let item = TodoItem {
            id: format!("{}{:016x}", TODO_PREFIX, rand::random::<u64>()),
            title,
            completed: false,
            status_changed: now_ms(),
        };
        self.save(&item).await
    }

    async fn update_status(&self, id: &str, completed: bool) -> object::Result<Value> {
        let mut item = self.load(id).await?;
        item.completed = completed;
        item.status_changed = now_ms();
        self.save(&item).await
    }

    async fn update_title(&self, id: &str, title: String) -> object::Result<Value> {
        let mut item = self.load(id).await?;
        item.title = title;
        self.save(&item).await
    }

    async fn list(&self) -> object::Result<Value> {
        let entries = self
            .state
            .storage()
            .list(&ListOptions::new().prefix(TODO_PREFIX))
            .await?;

        let mut items = entries
            .into_iter()
            .map(|(_, v)| objwire::from_value::<TodoItem>(v))
            .collect::<objwire::Result<Vec<_>>>()?;
        items.sort_by(|a, b| b.status_changed.cmp(&a.status_changed));

        Ok(objwire::to_value(&items)?)
    }

    async fn destroy(&self) -> object::Result<Value> {
        let storage = self.state.storage();
        let count = storage.list(&ListOptions::new()).await?.len();
        storage.delete_all().await?;
        Ok(Value::from(count))
    }
}

#[async_trait::async_trait]
impl RemoteObject for Todo {
    fn shape() -> TypeShape {
        TypeShape::level("Todo")
            .method(CONSTRUCTOR)
            .field("storage")
            .method("add")
            .method("updateStatus")
            .method("updateTitle")
            .method("getList")
            .method("destroy")
            .extends(TypeShape::base())
    }

    fn construct(state: ObjectState) -> object::Result<Self> {
        Ok(Self { state })
    }

    async fn call(&self, method: &str, args: Args) -> object::Result<Value> {
        match method {
            "add" => self.add(args.required(0)?).await,
            "updateStatus" => self.update_status(&args.required::<String>(0)?, args.required(1)?).await,
            "updateTitle" => self.update_title(&args.required::<String>(0)?, args.required(1)?).await,
            "getList" => self.list().await,
            "destroy" => self.destroy().await,
            other => Err(object::Error::MethodNotFound(other.to_string())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let directory = LocalDirectory::<Todo>::new("TODO");
    let todos = Namespace::<Todo>::with_config(Arc::new(directory), Config::from_env());
    let list = todos.get_by_name(TODO_LIST_NAME);
    let methods = list.methods().context("Todo exposes no methods")?;

    info!(id = %list.id(), "using todo list");

    let milk: TodoItem = methods.call("add", ("Buy milk",))?.returning().await?;
    let _eggs: TodoItem = methods.call("add", ("Buy eggs",))?.returning().await?;

    // One round trip: complete one item, rename it, then read the list back.
    let jobs = vec![
        methods.call("updateStatus", (milk.id.as_str(), true))?,
        methods.call("updateTitle", (milk.id.as_str(), "Buy oat milk"))?,
        methods.call("getList", ())?,
    ];
    let results = list.batch(move || jobs).await?;
    let current = results.into_iter().nth(2).context("batch reply is missing the list")?;
    let current: Vec<TodoItem> = objwire::from_value(current)?;
    for item in &current {
        info!(title = %item.title, completed = item.completed, "todo");
    }

    let raw = list.storage().list_with(ListOptions::new().prefix(TODO_PREFIX)).await?;
    info!(entries = raw.as_map().map(|m| m.len()).unwrap_or_default(), "raw storage");

    let removed: usize = methods.call("destroy", ())?.returning().await?;
    info!(removed, "cleared todo list");

    Ok(())
}
