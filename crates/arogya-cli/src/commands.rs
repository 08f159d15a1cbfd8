use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use arogya_core::api::{ApiError, SessionClient};
use arogya_core::auth::{self, AuthContext, MemoryStore, SessionStore};
use arogya_core::config::Config;
use arogya_core::models::{
    AccessLogEntry, AnalyzeRequest, ApiEnvelope, AuthResponse, EconomicStatus,
    EligibilityRequest, HospitalRegistration, Language, LoginRequest, PatientRegistration,
    RegisterRequest, ReportContent, ReportFile, ReportSummary, ReportUpload, Role, SchemeResult,
    Subscription, UpgradeRequest, UploadHistoryEntry, UserProfile, UserType,
};
use arogya_core::validation::{self, ValidationErrors};

use crate::output;
use crate::{
    Command, HospitalArgs, OtpCommand, PatientArgs, RegisterCommand, ReportsCommand,
    SchemesCommand, SubscriptionCommand,
};

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

pub struct App {
    config: Config,
    auth: AuthContext,
    ephemeral: bool,
}

impl App {
    pub async fn open(config: Config, ephemeral: bool) -> Result<Self> {
        let store: Arc<dyn SessionStore> = if ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            auth::open_store(config.credential_backend, config.data_dir()?)
        };

        let client = SessionClient::from_config(&config, store)
            .context("Failed to create API client")?;
        let auth = AuthContext::bootstrap(Arc::new(client)).await;

        Ok(Self {
            config,
            auth,
            ephemeral,
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { hospital, username } => self.login(hospital, username).await,
            Command::Logout => self.logout().await,
            Command::Whoami => self.whoami().await,
            Command::Register { cmd } => self.register(cmd).await,
            Command::Schemes { cmd } => self.schemes(cmd).await,
            Command::Reports { cmd } => self.reports(cmd).await,
            Command::Otp { cmd } => self.otp(cmd).await,
            Command::AccessLogs => self.access_logs().await,
            Command::History => self.upload_history().await,
            Command::Subscription { cmd } => self.subscription(cmd).await,
            Command::Language { language } => self.language(language),
        }
    }

    // ===== Session =====

    async fn login(&mut self, hospital: bool, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) => name,
            None => prompt("Username: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        let request = LoginRequest {
            user_type: if hospital {
                UserType::Hospital
            } else {
                UserType::Patient
            },
            username,
            password,
        };
        check_form(validation::validate_login(&request))?;

        let outcome = self.auth.login(&request).await?;
        let Some(profile) = outcome.profile else {
            let message = AuthResponse::from_value(&outcome.response)
                .error
                .unwrap_or_else(|| "Login failed".to_string());
            bail!(message);
        };

        if !self.ephemeral {
            self.config.last_username = Some(request.username.clone());
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }

        println!(
            "Welcome, {} ({})",
            profile.display_name(),
            profile.role().display_name()
        );
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.auth.logout().await;
        println!("Logged out.");
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        match self.auth.profile().await {
            Some(profile) => {
                println!("{} ({})", profile.display_name(), profile.role().display_name());
                println!("Username: {}", profile.username);
                if let Some(ref hospital) = profile.hospital_name {
                    println!("Hospital: {}", hospital);
                }
            }
            None => println!("Not logged in."),
        }
        println!("Language: {}", self.auth.language().display_name());
        println!("Server:   {}", self.client().base_url());
        Ok(())
    }

    async fn register(&self, command: RegisterCommand) -> Result<()> {
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;

        let registration = match command {
            RegisterCommand::Patient(args) => {
                let registration = patient_registration(args, password);
                check_form(validation::validate_patient_registration(
                    &registration,
                    &confirm,
                ))?;
                RegisterRequest::Patient(registration)
            }
            RegisterCommand::Hospital(args) => {
                let registration = hospital_registration(args, password);
                check_form(validation::validate_hospital_registration(
                    &registration,
                    &confirm,
                ))?;
                RegisterRequest::Hospital(registration)
            }
        };

        let response = self.auth.register(&registration).await?;
        let auth = AuthResponse::from_value(&response);
        if !auth.success {
            bail!(auth.error.unwrap_or_else(|| "Registration failed".to_string()));
        }
        info!(user_type = ?registration.user_type(), "Registered new account");
        println!("Registration successful. You can now log in.");
        Ok(())
    }

    // ===== Schemes =====

    async fn schemes(&self, command: SchemesCommand) -> Result<()> {
        let SchemesCommand::Check {
            age,
            district,
            economic_status,
            has_ration_card,
            has_aadhaar,
            disease_type,
        } = command;

        self.require(None).await?;
        let economic_status: EconomicStatus = economic_status.parse().map_err(|e: String| anyhow!(e))?;
        let request = EligibilityRequest {
            age,
            district,
            economic_status,
            has_ration_card,
            has_aadhaar,
            disease_type,
            language: self.auth.language().display_name().to_string(),
        };
        check_form(validation::validate_scheme_check(&request))?;

        let response = self.call(self.client().check_scheme_eligibility(&request).await).await?;
        match decode::<SchemeResult>(response)? {
            Some(scheme) => print_scheme(&scheme),
            None => println!("No matching scheme found."),
        }
        Ok(())
    }

    // ===== Reports =====

    async fn reports(&self, command: ReportsCommand) -> Result<()> {
        match command {
            ReportsCommand::List => {
                self.require(Some(Role::Patient)).await?;
                let response = self.call(self.client().patient_reports().await).await?;
                let reports: Vec<ReportSummary> = decode(response)?.unwrap_or_default();
                output::print_reports(&reports);
            }
            ReportsCommand::Upload {
                patient_phone,
                aadhaar_last4,
                title,
                scan_type,
                hospital_name,
                test_date,
                file,
            } => {
                let profile = self.require(Some(Role::HospitalStaff)).await?;
                let hospital_name = hospital_name
                    .or(profile.hospital_name)
                    .unwrap_or_default();
                let upload = ReportUpload {
                    patient_phone,
                    patient_aadhaar_last4: aadhaar_last4,
                    title,
                    scan_type,
                    hospital_name,
                    test_date,
                    file: ReportFile::from_path(&file)?,
                };
                check_form(validation::validate_report_upload(&upload))?;

                let phone = output::format_phone(&upload.patient_phone);
                let response = self.call(self.client().upload_report(upload).await).await?;
                decode::<Value>(response)?;
                println!("Report uploaded for {}.", phone);
            }
            ReportsCommand::Analyze { report_id, language } => {
                self.require(None).await?;
                let language = match language {
                    Some(code) => code.parse::<Language>().map_err(|e| anyhow!(e))?,
                    None => self.auth.language(),
                };
                let request = AnalyzeRequest {
                    report_id,
                    language: language.display_name().to_string(),
                };
                let response = self.call(self.client().analyze_report(&request).await).await?;
                if let Some(analysis) = decode::<Value>(response)? {
                    output::print_json(&analysis);
                }
            }
            ReportsCommand::View { report_id, out } => {
                self.require(Some(Role::Patient)).await?;
                let content = self.call(self.client().view_report(report_id).await).await?;
                self.save_report(report_id, content, out)?;
            }
        }
        Ok(())
    }

    fn save_report(&self, report_id: i64, content: ReportContent, out: Option<PathBuf>) -> Result<()> {
        let path = out.unwrap_or_else(|| {
            PathBuf::from(format!("report-{}.{}", report_id, content.extension()))
        });
        match content {
            ReportContent::Json(value) => {
                if let Some(false) = value.get("success").and_then(Value::as_bool) {
                    let envelope = ApiEnvelope::<Value>::from_value(value)?;
                    bail!(envelope.into_result().err().unwrap_or_default());
                }
                output::print_json(&value);
            }
            ReportContent::File { bytes, .. } => {
                std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Saved {} bytes to {}", bytes.len(), path.display());
            }
        }
        Ok(())
    }

    async fn otp(&self, command: OtpCommand) -> Result<()> {
        self.require(Some(Role::Patient)).await?;
        match command {
            OtpCommand::Request => {
                let response = self.call(self.client().request_otp().await).await?;
                let message = response
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("OTP sent to your registered phone number.");
                decode::<Value>(response.clone())?;
                println!("{}", message);
            }
            OtpCommand::Verify { code } => {
                let response = self.call(self.client().verify_otp(&code).await).await?;
                decode::<Value>(response)?;
                println!("OTP verified. Protected reports can now be viewed.");
            }
        }
        Ok(())
    }

    async fn access_logs(&self) -> Result<()> {
        self.require(Some(Role::Patient)).await?;
        let response = self.call(self.client().access_logs().await).await?;
        let logs: Vec<AccessLogEntry> = decode(response)?.unwrap_or_default();
        output::print_access_logs(&logs);
        Ok(())
    }

    async fn upload_history(&self) -> Result<()> {
        self.require(Some(Role::HospitalStaff)).await?;
        let response = self.call(self.client().upload_history().await).await?;
        let history: Vec<UploadHistoryEntry> = decode(response)?.unwrap_or_default();
        output::print_upload_history(&history);
        Ok(())
    }

    // ===== Subscription =====

    async fn subscription(&self, command: SubscriptionCommand) -> Result<()> {
        self.require(None).await?;
        let response = match command {
            SubscriptionCommand::Status => {
                self.call(self.client().subscription_status().await).await?
            }
            SubscriptionCommand::Upgrade { payment_id } => {
                let request = UpgradeRequest { payment_id };
                self.call(self.client().upgrade_premium(&request).await).await?
            }
        };
        let subscription: Subscription = decode(response)?.unwrap_or_default();
        output::print_subscription(&subscription);
        Ok(())
    }

    fn language(&self, language: Option<String>) -> Result<()> {
        match language {
            Some(code) => {
                let language: Language = code.parse().map_err(|e: String| anyhow!(e))?;
                self.auth.set_language(language)?;
                println!("Language set to {}.", language.display_name());
            }
            None => println!("{}", self.auth.language().display_name()),
        }
        Ok(())
    }

    // ===== Helpers =====

    fn client(&self) -> &SessionClient {
        self.auth.client()
    }

    /// The signed-in profile, optionally restricted to one role.
    async fn require(&self, role: Option<Role>) -> Result<UserProfile> {
        let profile = self
            .auth
            .profile()
            .await
            .ok_or_else(|| anyhow!("Not logged in. Run `arogya login` first."))?;
        if let Some(role) = role {
            if profile.role() != role {
                bail!("This command is only available to {} accounts.", role.display_name());
            }
        }
        Ok(profile)
    }

    /// Route a result through the auth context so an expired session ends
    /// the local login.
    async fn call<T>(&self, result: Result<T, ApiError>) -> Result<T> {
        self.auth.observe(result).await.map_err(|e| {
            if e.is_session_expired() {
                anyhow!(SESSION_EXPIRED_MESSAGE)
            } else {
                e.into()
            }
        })
    }
}

fn decode<T: DeserializeOwned>(response: Value) -> Result<Option<T>> {
    ApiEnvelope::<T>::from_value(response)
        .context("Unexpected response from server")?
        .into_result()
        .map_err(|message| anyhow!(message))
}

fn check_form(errors: ValidationErrors) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    for (field, message) in &errors {
        eprintln!("  {}: {}", field, message);
    }
    bail!("Please fix the fields above and try again.")
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn patient_registration(args: PatientArgs, password: String) -> PatientRegistration {
    PatientRegistration {
        username: args.username,
        email: args.email,
        password,
        full_name: args.full_name,
        phone_number: args.phone,
        age: args.age,
        district: args.district,
        economic_status: args.economic_status.to_ascii_uppercase(),
        has_ration_card: args.has_ration_card,
        has_aadhaar: args.has_aadhaar,
        aadhaar_last4: args.aadhaar_last4,
        disease_type: args.disease_type,
    }
}

fn hospital_registration(args: HospitalArgs, password: String) -> HospitalRegistration {
    HospitalRegistration {
        username: args.username,
        email: args.email,
        password,
        staff_name: args.staff_name,
        hospital_name: args.hospital_name,
        department: args.department,
        license_number: args.license_number,
    }
}

fn print_scheme(scheme: &SchemeResult) {
    println!("{}", scheme.scheme_name);
    if let Some(ref kind) = scheme.scheme_type {
        println!("Type:        {}", kind);
    }
    if let Some(ref score) = scheme.eligibility_score {
        println!("Eligibility: {}", score);
    }
    if let Some(ref why) = scheme.why_eligible {
        println!("\n{}", why);
    }
    if !scheme.required_documents.is_empty() {
        println!("\nRequired documents:");
        for doc in &scheme.required_documents {
            println!("  - {}", doc);
        }
    }
    if !scheme.apply_steps.is_empty() {
        println!("\nHow to apply:");
        for step in &scheme.apply_steps {
            println!("  {}", step);
        }
    }
}
