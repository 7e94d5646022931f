/*!
devconsole: an embeddable developer console.

Hosts register typed commands and convars (named runtime variables), then
feed raw text lines to [`Console::dispatch`]. Each line is split into
`|`-separated invocations, names are resolved against the session's current
category, `{name}` tokens are replaced by convar values, and arguments are
converted to the declared parameter types before the callable runs. Access
is gated per session by a [`Capability`] plus optional per-command filters.

```
use devconsole::{BufferSink, CommandDecl, Console, Context, Declarations, Param, ValueKind};

let console = Console::new();
console
    .load(Declarations::new().command(
        CommandDecl::new("greet", |ctx, inv| {
            ctx.info(format!("hello {}", inv.text(0)?));
            Ok(())
        })
        .param(Param::required("who", ValueKind::Text)),
    ))
    .unwrap();

let sink = BufferSink::new();
let mut ctx = Context::standard(sink.clone());
console.dispatch(&mut ctx, r#"greet "big world""#).unwrap();
assert_eq!(sink.texts(), vec!["hello big world"]);
```
*/

pub mod console;
pub mod persist;

pub use console::access::{Capability, Filter, FilterMode};
pub use console::command::{Arg, Command, CommandDecl, Handler, Invocation, Param};
pub use console::context::{BufferSink, Context, Level, Message, OutputSink, TracingSink};
pub use console::convar::{Bound, Convar, ConvarBacking, ConvarDecl, ConvarStore, Slot};
pub use console::error::{ConversionError, DispatchError, InvalidCategory, RegistrationError};
pub use console::value::{EnumType, Value, ValueKind, coerce};
pub use console::{Console, Declarations, ECHO_CONVAR, Outcome, STRICT_CONVAR};
