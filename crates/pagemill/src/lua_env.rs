// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lua state setup shared by the data source and the bundle renderer.
//!
//! Provides `json.encode`, `json.decode`, `json.encode_pretty` and `json.null`
//! both as a global and through `require("json")`.

use mlua::{Lua, LuaSerdeExt, Result as LuaResult, Table, Value};

fn create_json_table(lua: &Lua) -> LuaResult<Table> {
    let module = lua.create_table()?;

    let encode = lua.create_function(|_, value: Value| {
        serde_json::to_string(&value).map_err(|err| mlua::Error::external(format!("JSON encode error: {}", err)))
    })?;
    module.set("encode", encode)?;

    let encode_pretty = lua.create_function(|_, value: Value| {
        serde_json::to_string_pretty(&value)
            .map_err(|err| mlua::Error::external(format!("JSON encode error: {}", err)))
    })?;
    module.set("encode_pretty", encode_pretty)?;

    let decode = lua.create_function(|lua, json_str: String| {
        match serde_json::from_str::<serde_json::Value>(&json_str) {
            Ok(json_value) => lua.to_value(&json_value),
            Err(err) => Err(mlua::Error::external(format!("JSON decode error: {}", err))),
        }
    })?;
    module.set("decode", decode)?;

    module.set("null", lua.null())?;
    Ok(module)
}

/// Registers the json module as a global and in `package.preload`.
pub fn register_json_module(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    globals.set("json", create_json_table(lua)?)?;

    let package: Table = globals.get("package")?;
    let preload: Table = package.get("preload")?;
    let loader = lua.create_function(|lua, _: ()| create_json_table(lua))?;
    preload.set("json", loader)?;

    Ok(())
}

/// Removes file, process and dynamic-code access from a Lua state.
///
/// Keeps `os.date`, `os.time`, `os.clock` and `os.difftime`.
pub fn sandbox(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();

    let os_table: Table = globals.get("os")?;
    let safe_os = lua.create_table()?;
    for name in ["date", "time", "clock", "difftime"] {
        let function: mlua::Function = os_table.get(name)?;
        safe_os.set(name, function)?;
    }

    for name in ["io", "debug", "load", "loadstring", "loadfile", "dofile"] {
        globals.set(name, Value::Nil)?;
    }
    globals.set("os", safe_os)?;

    Ok(())
}
