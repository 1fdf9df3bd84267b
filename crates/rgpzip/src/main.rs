fn main() -> anyhow::Result<()> {
    rgpzip::run()
}
