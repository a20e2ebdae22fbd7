use anyhow::Context;
use clap::Parser;
use ovpn_instances::config::Command;
use ovpn_instances::core::listing::{format_json, format_table};
use ovpn_instances::core::manager::MenuOutcome;
use ovpn_instances::utils::{logger, validation::Validate};
use ovpn_instances::{CliConfig, Console, DefaultAllocator, InstanceManager, OvpnError};

fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    // Root check happens before anything touches the filesystem.
    if !cli.skip_root_check && !nix::unistd::geteuid().is_root() {
        eprintln!("{}", OvpnError::NotRoot.user_friendly_message());
        std::process::exit(OvpnError::NotRoot.exit_code());
    }

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<OvpnError>() {
            Some(OvpnError::Cancelled) => {
                tracing::info!("Cancelled by user");
                std::process::exit(OvpnError::Cancelled.exit_code());
            }
            Some(err) => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 {}", err.recovery_suggestion());
                std::process::exit(err.exit_code());
            }
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run(cli: &CliConfig) -> anyhow::Result<()> {
    let config = cli.resolve()?;
    config.validate()?;
    tracing::debug!("Resolved config: {:?}", config);

    let allocator = DefaultAllocator::new(config.allocator_defaults()?);
    let mut manager = InstanceManager::new(
        config.registry(),
        allocator,
        config.validation.network_match,
        Console::stdio(),
        config.installer(),
    );

    match cli.command.clone().unwrap_or(Command::Menu) {
        Command::Menu => match manager.run_menu()? {
            MenuOutcome::Created(instance) => {
                println!("✅ Instance {} created ({})", instance.name, instance.service_name());
            }
            MenuOutcome::Managed(instance) => {
                println!("✅ Instance {} managed", instance.name);
            }
        },
        Command::Create => {
            let instance = manager.create_interactive()?;
            println!("✅ Instance {} created ({})", instance.name, instance.service_name());
        }
        Command::List { json } => {
            let instances = manager.list()?;
            if json {
                println!("{}", format_json(&instances)?);
            } else if instances.is_empty() {
                println!(
                    "No instances registered in {}",
                    manager.registry().path().display()
                );
            } else {
                println!("{}", format_table(&instances));
            }
        }
        Command::Suggest => {
            let suggestion = manager.suggest()?;
            println!("name:    {}", suggestion.name);
            println!("port:    {}", suggestion.port);
            println!("network: {}", suggestion.network);
        }
        Command::Add {
            name,
            port,
            protocol,
            network,
        } => {
            let instance = manager
                .add(&name, port, &protocol, &network)
                .with_context(|| format!("failed to add instance '{}'", name))?;
            println!("✅ Instance {} created ({})", instance.name, instance.service_name());
        }
    }

    Ok(())
}
