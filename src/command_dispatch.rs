//! Purpose: Hold top-level CLI command dispatch for `stockroom`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command emits exactly one JSON document on stdout on success.

use super::*;
use stockroom::api::{Session, StockAdjustment, now_rfc3339, render_summary, stock_breakdown};

pub(super) fn dispatch_command(
    command: Command,
    context: &CliContext,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "stockroom", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve::ServeConfig {
                bind: args.bind,
                db: args.db,
                allow_non_loopback: args.allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::Login { secret } => {
            let service = context.service()?;
            let Some(user) = service.login(&secret)? else {
                return Err(Error::new(ErrorKind::Permission)
                    .with_message("Invalid secret code")
                    .with_hint("Check the code and try again."));
            };
            let session = Session::from_user(&user, now_rfc3339()?);
            context.local().save_session(&session)?;
            emit_json(json!({ "session": session }));
            Ok(RunOutcome::ok())
        }
        Command::Logout => {
            context.local().clear_session()?;
            emit_json(json!({ "session": null }));
            Ok(RunOutcome::ok())
        }
        Command::Whoami => {
            let session = context.local().session()?;
            emit_json(json!({ "session": session }));
            Ok(RunOutcome::ok())
        }
        Command::Product { command } => dispatch_product(command, context),
        Command::Stock { command } => {
            let (args, adjustment) = match command {
                StockCommand::Add(args) => {
                    let adjustment = StockAdjustment::add(args.stock, args.quantity);
                    (args, adjustment)
                }
                StockCommand::Remove(args) => {
                    let adjustment = StockAdjustment::remove(args.stock, args.quantity);
                    (args, adjustment)
                }
            };
            let actor = context.local().actor()?;
            let outcome = context
                .service()?
                .update_stock(args.product, adjustment, actor)?;
            Ok(emit_outcome(&outcome))
        }
        Command::Stats => {
            let statistics = context.service()?.statistics()?;
            emit_json(json!({ "statistics": statistics }));
            Ok(RunOutcome::ok())
        }
        Command::Export { id, out } => {
            let product = context.service()?.get_product(id)?;
            let html = render_summary(&product);
            match out {
                Some(path) => {
                    std::fs::write(&path, html).map_err(|err| {
                        Error::new(ErrorKind::Internal)
                            .with_message(format!("failed to write {}", path.display()))
                            .with_source(err)
                    })?;
                    emit_json(json!({
                        "export": {
                            "product_id": product.id,
                            "path": path.display().to_string(),
                        }
                    }));
                }
                None => print!("{html}"),
            }
            Ok(RunOutcome::ok())
        }
        Command::Deletions => {
            let ledger = context.local().ledger()?;
            let entries = ledger.into_values().collect::<Vec<_>>();
            emit_json(json!({ "deletions": entries }));
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_product(command: ProductCommand, context: &CliContext) -> Result<RunOutcome, Error> {
    let service = context.service()?;
    match command {
        ProductCommand::List { search, sort } => {
            let products = service.browse(search.as_deref().unwrap_or(""), sort.into())?;
            emit_json(json!({ "products": products }));
            Ok(RunOutcome::ok())
        }
        ProductCommand::Show { id } => {
            let product = service.get_product(id)?;
            emit_product_detail(&product);
            Ok(RunOutcome::ok())
        }
        ProductCommand::Scan { barcode } => {
            let product = service.find_by_barcode(&barcode)?;
            emit_product_detail(&product);
            Ok(RunOutcome::ok())
        }
        ProductCommand::Add(args) => {
            let actor = context.local().actor()?;
            let outcome = service.create_product(&args.into_new_product(), actor)?;
            Ok(emit_outcome(&outcome))
        }
        ProductCommand::Edit(args) => {
            let (id, patch) = args.into_patch();
            if patch.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("nothing to edit")
                    .with_hint(
                        "Pass --name, --type, --price, --supplier, --image or --set-quantity.",
                    ));
            }
            let actor = context.local().actor()?;
            let outcome = service.update_product(id, &patch, actor)?;
            Ok(emit_outcome(&outcome))
        }
        ProductCommand::Delete { id } => {
            let deleted = service.delete_product(id)?;
            let entry = context
                .local()
                .record_deletion(&deleted.name, &now_rfc3339()?)?;
            emit_json(json!({
                "deleted": deleted,
                "ledger": entry,
            }));
            Ok(RunOutcome::ok())
        }
    }
}

fn emit_product_detail(product: &Product) {
    let breakdown = stock_breakdown(product);
    emit_json(json!({
        "product": product,
        "stock": breakdown,
    }));
}
