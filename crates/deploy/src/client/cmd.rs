//! Command builder for the `stellar` CLI.

use std::path::Path;

use super::InvokeArg;

/// Builder for `stellar` subcommands.
#[derive(Debug, Clone)]
pub struct StellarCmdBuilder {
    subcommand: Vec<String>,
    source_account: Option<String>,
    network: Option<String>,
    options: Vec<String>,
    call: Option<(String, Vec<InvokeArg>)>,
}

impl StellarCmdBuilder {
    fn new(subcommand: &[&str]) -> Self {
        Self {
            subcommand: subcommand.iter().map(|s| s.to_string()).collect(),
            source_account: None,
            network: None,
            options: Vec::new(),
            call: None,
        }
    }

    /// `stellar contract deploy --wasm <path>`.
    pub fn deploy(wasm: &Path) -> Self {
        Self::new(&["contract", "deploy"]).option("--wasm", wasm.display().to_string())
    }

    /// `stellar contract invoke --id <address> -- <entrypoint> ...`.
    pub fn invoke(address: &str, entrypoint: &str, args: &[InvokeArg]) -> Self {
        let mut builder = Self::new(&["contract", "invoke"]).option("--id", address);
        builder.call = Some((entrypoint.to_string(), args.to_vec()));
        builder
    }

    /// `stellar contract id asset --asset <asset>`.
    pub fn asset_id(asset: &str) -> Self {
        Self::new(&["contract", "id", "asset"]).option("--asset", asset)
    }

    /// `stellar contract build`.
    pub fn build() -> Self {
        Self::new(&["contract", "build"])
    }

    /// `stellar keys address <identity>`.
    pub fn keys_address(identity: &str) -> Self {
        let mut builder = Self::new(&["keys", "address"]);
        builder.subcommand.push(identity.to_string());
        builder
    }

    /// `stellar keys generate <identity>`.
    pub fn keys_generate(identity: &str) -> Self {
        let mut builder = Self::new(&["keys", "generate"]);
        builder.subcommand.push(identity.to_string());
        builder
    }

    /// Set the signing identity.
    pub fn source_account(mut self, identity: impl Into<String>) -> Self {
        self.source_account = Some(identity.into());
        self
    }

    /// Set the network.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Add a `<flag> <value>` pair.
    pub fn option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.options.push(flag.to_string());
        self.options.push(value.into());
        self
    }

    /// Build the argument list (without the program name).
    pub fn build_args(self) -> Vec<String> {
        let mut cmd = self.subcommand;
        cmd.extend(self.options);

        if let Some(source_account) = self.source_account {
            cmd.push("--source-account".to_string());
            cmd.push(source_account);
        }

        if let Some(network) = self.network {
            cmd.push("--network".to_string());
            cmd.push(network);
        }

        if let Some((entrypoint, args)) = self.call {
            cmd.push("--".to_string());
            cmd.push(entrypoint);
            for arg in args {
                cmd.push(format!("--{}", arg.name));
                cmd.push(arg.value);
            }
        }

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_cmd() {
        let cmd = StellarCmdBuilder::deploy(Path::new("out/token.wasm"))
            .source_account("alice")
            .network("testnet")
            .build_args();

        assert_eq!(
            cmd,
            vec![
                "contract",
                "deploy",
                "--wasm",
                "out/token.wasm",
                "--source-account",
                "alice",
                "--network",
                "testnet",
            ]
        );
    }

    #[test]
    fn test_invoke_cmd_puts_call_after_separator() {
        let cmd = StellarCmdBuilder::invoke(
            "CABC",
            "initialize",
            &[InvokeArg::new("admin", "GADMIN"), InvokeArg::new("required", "1")],
        )
        .source_account("alice")
        .network("testnet")
        .build_args();

        let separator = cmd.iter().position(|s| s == "--").expect("separator");
        assert_eq!(&cmd[..4], &["contract", "invoke", "--id", "CABC"]);
        assert!(cmd[..separator].contains(&"--network".to_string()));
        assert_eq!(
            &cmd[separator + 1..],
            &["initialize", "--admin", "GADMIN", "--required", "1"]
        );
    }

    #[test]
    fn test_keys_cmds() {
        assert_eq!(
            StellarCmdBuilder::keys_address("alice").build_args(),
            vec!["keys", "address", "alice"]
        );
        assert_eq!(
            StellarCmdBuilder::keys_generate("alice")
                .network("testnet")
                .build_args(),
            vec!["keys", "generate", "alice", "--network", "testnet"]
        );
        assert_eq!(
            StellarCmdBuilder::asset_id("native")
                .network("mainnet")
                .build_args(),
            vec!["contract", "id", "asset", "--asset", "native", "--network", "mainnet"]
        );
    }
}
