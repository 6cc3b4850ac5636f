//! Library tools - descriptors and handlers bound to a [`Library`]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::registry::{RegistryError, RequiredArgument, ToolDescriptor, ToolRegistry};
use crate::library::Library;

pub const SEARCH_LIBRARY: &str = "search_library";
pub const GET_ITEM_DETAILS: &str = "get_item_details";
pub const GET_CONTENT: &str = "get_content";
pub const GET_ITEM_ABSTRACT: &str = "get_item_abstract";
pub const GET_COLLECTIONS: &str = "get_collections";
pub const SEARCH_COLLECTIONS: &str = "search_collections";
pub const GET_COLLECTION_ITEMS: &str = "get_collection_items";
pub const SEARCH_BY_TAG: &str = "search_by_tag";

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize)]
struct SearchArgs {
    q: String,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemArgs {
    item_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentArgs {
    item_key: Option<String>,
    attachment_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionArgs {
    collection_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct TagArgs {
    tag: String,
}

fn parse<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| anyhow!("Invalid arguments: {}", e))
}

fn string_property(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

/// Static descriptors for every library tool, in listing order
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            SEARCH_LIBRARY,
            "Search the document library by title, abstract, creator, venue or tag.",
            json!({
                "type": "object",
                "properties": {
                    "q": string_property("Search text"),
                    "limit": {"type": "integer", "description": "Maximum hits (default 20)", "minimum": 1}
                },
                "required": ["q"]
            }),
        )
        .require(RequiredArgument::field("q")),
        ToolDescriptor::new(
            GET_ITEM_DETAILS,
            "Full metadata for one library item, including attachments and notes.",
            json!({
                "type": "object",
                "properties": {"itemKey": string_property("Item key")},
                "required": ["itemKey"]
            }),
        )
        .require(RequiredArgument::field("itemKey")),
        ToolDescriptor::new(
            GET_CONTENT,
            "Extracted text of an attachment, or of all attachments of an item.",
            json!({
                "type": "object",
                "properties": {
                    "itemKey": string_property("Item key"),
                    "attachmentKey": string_property("Attachment key")
                }
            }),
        )
        .require(RequiredArgument::any_of(&["itemKey", "attachmentKey"])),
        ToolDescriptor::new(
            GET_ITEM_ABSTRACT,
            "Abstract of one library item.",
            json!({
                "type": "object",
                "properties": {"itemKey": string_property("Item key")},
                "required": ["itemKey"]
            }),
        )
        .require(RequiredArgument::field("itemKey")),
        ToolDescriptor::new(
            GET_COLLECTIONS,
            "List every collection in the library.",
            json!({"type": "object", "properties": {}}),
        ),
        ToolDescriptor::new(
            SEARCH_COLLECTIONS,
            "Find collections whose name contains the search text.",
            json!({
                "type": "object",
                "properties": {"q": string_property("Search text")},
                "required": ["q"]
            }),
        )
        .require(RequiredArgument::field("q")),
        ToolDescriptor::new(
            GET_COLLECTION_ITEMS,
            "Items filed in a collection.",
            json!({
                "type": "object",
                "properties": {"collectionKey": string_property("Collection key")},
                "required": ["collectionKey"]
            }),
        )
        .require(RequiredArgument::field("collectionKey")),
        ToolDescriptor::new(
            SEARCH_BY_TAG,
            "Items carrying a tag (case-insensitive).",
            json!({
                "type": "object",
                "properties": {"tag": string_property("Tag name")},
                "required": ["tag"]
            }),
        )
        .require(RequiredArgument::field("tag")),
    ]
}

/// Register every library tool against `library`
pub fn register(registry: &mut ToolRegistry, library: Arc<Library>) -> Result<(), RegistryError> {
    for descriptor in descriptors() {
        let library = library.clone();
        let name = descriptor.name.clone();
        registry.register_fn(descriptor, move |args| {
            let library = library.clone();
            let name = name.clone();
            async move { call(&library, &name, args) }
        })?;
    }
    registry.alias("search", SEARCH_LIBRARY)?;
    registry.alias("get_item_fulltext", GET_CONTENT)?;
    Ok(())
}

fn call(library: &Library, tool: &str, args: Value) -> Result<Value> {
    match tool {
        SEARCH_LIBRARY => {
            let args: SearchArgs = parse(args)?;
            let limit = args
                .limit
                .unwrap_or(DEFAULT_SEARCH_LIMIT)
                .clamp(1, MAX_SEARCH_LIMIT);
            let hits = library.search(&args.q, limit);
            Ok(json!({"query": args.q, "total": hits.len(), "items": hits}))
        }
        GET_ITEM_DETAILS => {
            let args: ItemArgs = parse(args)?;
            let item = library
                .item(&args.item_key)
                .ok_or_else(|| anyhow!("Item not found: {}", args.item_key))?;
            Ok(serde_json::to_value(item)?)
        }
        GET_CONTENT => {
            let args: ContentArgs = parse(args)?;
            let blocks = library
                .content(args.item_key.as_deref(), args.attachment_key.as_deref())
                .ok_or_else(|| {
                    anyhow!(
                        "No item or attachment found for {}",
                        args.attachment_key
                            .as_deref()
                            .or(args.item_key.as_deref())
                            .unwrap_or_default()
                    )
                })?;
            if blocks.is_empty() {
                return Ok(Value::String("No extracted text available".to_string()));
            }
            Ok(json!({"content": blocks}))
        }
        GET_ITEM_ABSTRACT => {
            let args: ItemArgs = parse(args)?;
            let item = library
                .item(&args.item_key)
                .ok_or_else(|| anyhow!("Item not found: {}", args.item_key))?;
            if item.abstract_note.is_empty() {
                Ok(Value::String(format!("No abstract for {}", item.key)))
            } else {
                Ok(Value::String(item.abstract_note.clone()))
            }
        }
        GET_COLLECTIONS => Ok(json!({"collections": library.collections()})),
        SEARCH_COLLECTIONS => {
            let args: SearchArgs = parse(args)?;
            Ok(json!({"collections": library.search_collections(&args.q)}))
        }
        GET_COLLECTION_ITEMS => {
            let args: CollectionArgs = parse(args)?;
            let collection = library
                .collection(&args.collection_key)
                .ok_or_else(|| anyhow!("Collection not found: {}", args.collection_key))?;
            Ok(json!({
                "collection": collection,
                "items": library.collection_items(&collection.key)
            }))
        }
        SEARCH_BY_TAG => {
            let args: TagArgs = parse(args)?;
            Ok(json!({"tag": args.tag, "items": library.items_with_tag(&args.tag)}))
        }
        other => Err(anyhow!("No handler bound for {}", other)),
    }
}
